use kiln_core::reference::PackageReference;
use kiln_core::requirement::{Requirement, RequirementEntry};

#[test]
fn parse_full_reference() {
    let r = PackageReference::parse("openssl/3.0.8@acme/stable#a1b2").unwrap();
    assert_eq!(r.name, "openssl");
    assert_eq!(r.version.to_string(), "3.0.8");
    assert_eq!(r.user.as_deref(), Some("acme"));
    assert_eq!(r.channel.as_deref(), Some("stable"));
    assert_eq!(r.revision.as_deref(), Some("a1b2"));
    assert_eq!(r.to_string(), "openssl/3.0.8@acme/stable#a1b2");
}

#[test]
fn parse_short_reference() {
    let r = PackageReference::parse("zlib/1.3").unwrap();
    assert!(r.user.is_none() && r.channel.is_none() && r.revision.is_none());
    assert_eq!(r.to_string(), "zlib/1.3");
    assert_eq!(r.short(), "zlib/1.3");
}

#[test]
fn underscore_user_channel_means_none() {
    let r = PackageReference::parse("zlib/1.3@_/_").unwrap();
    assert!(r.user.is_none());
    assert_eq!(r.to_string(), "zlib/1.3");
}

#[test]
fn invalid_references() {
    assert!(PackageReference::parse("zlib").is_err());
    assert!(PackageReference::parse("/1.0").is_err());
    assert!(PackageReference::parse("zlib/").is_err());
    assert!(PackageReference::parse("zlib/1.0@user").is_err());
    assert!(PackageReference::parse("zlib/1.0#").is_err());
    assert!(PackageReference::parse("zlib/[>=1.0]").is_err());
}

#[test]
fn references_compare_every_field() {
    let a = PackageReference::parse("zlib/1.3#r1").unwrap();
    let b = PackageReference::parse("zlib/1.3#r2").unwrap();
    let c = PackageReference::parse("zlib/1.3#r1").unwrap();
    assert_ne!(a, b);
    assert_eq!(a, c);
}

#[test]
fn requirement_parse_and_satisfy() {
    let req = Requirement::parse("zlib/[>=1.2 <2]").unwrap();
    assert!(req.satisfied_by(&PackageReference::parse("zlib/1.3").unwrap()));
    assert!(!req.satisfied_by(&PackageReference::parse("zlib/2.0").unwrap()));
    assert!(!req.satisfied_by(&PackageReference::parse("zlib/1.3@acme/stable").unwrap()));
    assert!(!req.satisfied_by(&PackageReference::parse("bzip2/1.3").unwrap()));
}

#[test]
fn requirement_revision_must_match_when_given() {
    let req = Requirement::parse("zlib/1.3#r2").unwrap();
    assert!(req.satisfied_by(&PackageReference::parse("zlib/1.3#r2").unwrap()));
    assert!(!req.satisfied_by(&PackageReference::parse("zlib/1.3#r1").unwrap()));
    assert!(!req.satisfied_by(&PackageReference::parse("zlib/1.3").unwrap()));

    let any_rev = Requirement::parse("zlib/1.3").unwrap();
    assert!(any_rev.satisfied_by(&PackageReference::parse("zlib/1.3#r1").unwrap()));
}

#[test]
fn requirement_exact_copies_reference() {
    let reference = PackageReference::parse("zlib/1.3@acme/stable#r9").unwrap();
    let req = Requirement::exact(&reference);
    assert!(req.satisfied_by(&reference));
    assert_eq!(req.to_string(), "zlib/1.3@acme/stable#r9");
}

#[test]
fn detailed_entry_carries_flags() {
    let entry: RequirementEntry = toml::from_str(
        r#"
ref = "cmake/3.27"
build = true
private = true
options = { shared = true }
"#,
    )
    .unwrap();
    let req = entry.to_requirement().unwrap();
    assert!(req.build);
    assert!(req.private);
    assert!(!req.is_override);
    assert_eq!(req.options.get("shared").map(String::as_str), Some("True"));
}
