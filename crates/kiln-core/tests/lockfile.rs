use kiln_core::lockfile::{LockedDependency, LockedNode, Lockfile, LOCKFILE_VERSION};
use kiln_core::settings::ValueMap;
use tempfile::TempDir;

fn sample() -> Lockfile {
    let mut settings = ValueMap::new();
    settings.insert("os".to_string(), "Linux".to_string());
    let mut options = ValueMap::new();
    options.insert("shared".to_string(), "False".to_string());

    Lockfile {
        version: LOCKFILE_VERSION,
        nodes: vec![
            LockedNode {
                reference: "app/1.0".to_string(),
                package_id: "a".repeat(64),
                coexist: false,
                overridden: false,
                settings: settings.clone(),
                options: ValueMap::new(),
                dependencies: vec![
                    LockedDependency {
                        index: 1,
                        build: false,
                        private: false,
                    },
                    LockedDependency {
                        index: 2,
                        build: true,
                        private: false,
                    },
                ],
            },
            LockedNode {
                reference: "zlib/1.3#r1".to_string(),
                package_id: "b".repeat(64),
                coexist: false,
                overridden: true,
                settings,
                options,
                dependencies: vec![],
            },
            LockedNode {
                reference: "cmake/3.27".to_string(),
                package_id: "c".repeat(64),
                coexist: false,
                overridden: false,
                settings: ValueMap::new(),
                options: ValueMap::new(),
                dependencies: vec![],
            },
        ],
    }
}

#[test]
fn round_trip_serialize_deserialize() {
    let lockfile = sample();
    let text = lockfile.to_string_pretty().unwrap();
    let parsed = Lockfile::parse(&text).unwrap();
    assert_eq!(parsed, lockfile);
}

#[test]
fn reserialization_is_byte_identical() {
    let text = sample().to_string_pretty().unwrap();
    let again = Lockfile::parse(&text).unwrap().to_string_pretty().unwrap();
    assert_eq!(text, again);
}

#[test]
fn empty_flags_are_omitted() {
    let text = sample().to_string_pretty().unwrap();
    assert!(text.contains("build = true"));
    assert!(!text.contains("private"));
    assert!(!text.contains("coexist"));
    assert_eq!(text.matches("overridden = true").count(), 1);
}

#[test]
fn unsupported_version_rejected() {
    let err = Lockfile::parse("version = 99\n").unwrap_err();
    assert!(err.to_string().contains("unsupported lockfile version"));
}

#[test]
fn empty_lockfile_parses() {
    let parsed = Lockfile::parse("version = 1\n").unwrap();
    assert!(parsed.nodes.is_empty());
}

#[test]
fn write_and_load_from_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("Kiln.lock");
    sample().write_to(&path).unwrap();
    assert_eq!(Lockfile::from_path(&path).unwrap(), sample());
}
