mod common;

use common::*;
use kiln_core::config::OverridePolicy;
use kiln_core::recipe::Recipe;
use kiln_core::settings::Profile;
use kiln_resolver::conflict::EventKind;
use kiln_resolver::{resolve, FetchFailure, ResolveError, ResolutionResult};

fn run(set: &kiln_core::requirement::RequirementSet, provider: &MemoryProvider) -> ResolutionResult {
    resolve(set, &Profile::new(), provider, None, &config()).unwrap()
}

fn version_of(result: &ResolutionResult, name: &str) -> String {
    let idx = result.graph.find(name).unwrap();
    result.graph.node(idx).reference.version.to_string()
}

#[test]
fn diamond_collapses_to_one_node() {
    let provider = universe()
        .package("a/1.0", &["zlib/[>=1.2 <2]"])
        .package("b/1.0", &["zlib/[~1.3]"]);
    let result = run(&app(vec![req("a/1.0"), req("b/1.0")]), &provider);

    assert_eq!(result.graph.len(), 3);
    assert_eq!(version_of(&result, "zlib"), "1.3");
    let zlib = result.graph.find("zlib").unwrap();
    assert_eq!(result.graph.dependents_of(zlib).len(), 2);
    assert!(result.report.is_empty());
}

#[test]
fn ranges_skip_prereleases() {
    let result = run(&app(vec![req("zlib/[*]")]), &universe());
    assert_eq!(version_of(&result, "zlib"), "1.3");

    let result = run(&app(vec![req("zlib/[* include_prerelease]")]), &universe());
    assert_eq!(version_of(&result, "zlib"), "1.4-beta");
}

#[test]
fn alias_resolves_to_latest_release() {
    let result = run(&app(vec![req("zlib/(latest)")]), &universe());
    assert_eq!(version_of(&result, "zlib"), "1.3");
}

#[test]
fn resolution_is_deterministic() {
    let provider = universe()
        .package("a/1.0", &["zlib/[>=1.2]", "c/1.0"])
        .package("b/1.0", &["c/1.0"])
        .package("c/1.0", &["zlib/[>=1.2.11]"]);
    let set = app(vec![req("a/1.0"), req("b/1.0")]);

    let first = kiln_resolver::lock::write(&run(&set, &provider).graph).unwrap();
    let second = kiln_resolver::lock::write(&run(&set, &provider).graph).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.to_string_pretty().unwrap(),
        second.to_string_pretty().unwrap()
    );
}

#[test]
fn incompatible_versions_conflict_with_both_paths() {
    let provider = universe()
        .package("a/1.0", &["zlib/1.2.11"])
        .package("b/1.0", &["zlib/1.3"]);
    let err = resolve(
        &app(vec![req("a/1.0"), req("b/1.0")]),
        &Profile::new(),
        &provider,
        None,
        &config(),
    )
    .unwrap_err();

    match err {
        ResolveError::Conflict {
            name,
            existing,
            requested,
            existing_path,
            requested_path,
            ..
        } => {
            assert_eq!(name, "zlib");
            assert_eq!(existing, "zlib/1.2.11");
            assert_eq!(requested, "zlib/1.3");
            assert_eq!(existing_path, vec!["app/1.0", "a/1.0", "zlib/1.2.11"]);
            assert_eq!(requested_path, vec!["app/1.0", "b/1.0", "zlib/1.3"]);
        }
        other => panic!("expected conflict, got {other}"),
    }
}

#[test]
fn root_override_wins_over_transitive_requests() {
    let provider = universe()
        .package("a/1.0", &["zlib/1.2.11"])
        .package("b/1.0", &["zlib/1.2.13"]);
    let set = app(vec![
        req("a/1.0"),
        req("b/1.0"),
        req("zlib/1.3").with_override(),
    ]);
    let result = run(&set, &provider);

    assert_eq!(version_of(&result, "zlib"), "1.3");
    let zlib = result.graph.find("zlib").unwrap();
    assert!(result.graph.node(zlib).overridden);
    assert_eq!(result.graph.dependents_of(zlib).len(), 3);
    assert_eq!(result.report.of_kind(EventKind::Override).count(), 2);
}

#[test]
fn late_override_replaces_node_and_retires_old_subtree() {
    let provider = MemoryProvider::new()
        .package("zlib/1.2.11", &["legacy/1.0"])
        .package("zlib/1.3", &[])
        .package("legacy/1.0", &[])
        .package("x/1.0", &["zlib/1.2.11"])
        .package("y/1.0", &["m/1.0"])
        .recipe("m/1.0", {
            let mut r = Recipe::default();
            r.requires.push(req("zlib/1.3").with_override());
            r
        });
    let result = run(&app(vec![req("x/1.0"), req("y/1.0")]), &provider);

    assert_eq!(version_of(&result, "zlib"), "1.3");
    assert!(result.graph.find("legacy").is_none());
    let zlib = result.graph.find("zlib").unwrap();
    let x = result.graph.find("x").unwrap();
    assert!(result
        .graph
        .dependencies_of(x)
        .iter()
        .any(|(dep, _)| *dep == zlib));
}

/// `p` sits under the retired `x/1.0 -> y` branch and is also reached
/// through `q -> q2`, so its queued requirements outlive `y`.
fn shared_descendant_universe(x2_override: bool) -> MemoryProvider {
    MemoryProvider::new()
        .package("x/1.0", &["y/1.0"])
        .package("x/2.0", &[])
        .package("y/1.0", &["p/1.0"])
        .package("p/1.0", &["leaf/1.0"])
        .package("leaf/1.0", &[])
        .package("q/1.0", &["q2/1.0"])
        .package("q2/1.0", &["p/1.0"])
        .package("c/1.0", &["c2/1.0"])
        .recipe("c2/1.0", {
            let mut r = Recipe::default();
            let x2 = req("x/2.0");
            r.requires.push(if x2_override { x2.with_override() } else { x2 });
            r
        })
}

#[test]
fn late_override_keeps_work_queued_below_a_retired_node() {
    let provider = shared_descendant_universe(true);
    let result = run(
        &app(vec![req("x/1.0"), req("q/1.0"), req("c/1.0")]),
        &provider,
    );

    assert_eq!(version_of(&result, "x"), "2.0");
    assert!(result.graph.find("y").is_none());
    assert_eq!(version_of(&result, "p"), "1.0");
    assert_eq!(version_of(&result, "leaf"), "1.0");
    let p = result.graph.find("p").unwrap();
    let leaf = result.graph.find("leaf").unwrap();
    assert!(result
        .graph
        .dependencies_of(p)
        .iter()
        .any(|(dep, _)| *dep == leaf));
    assert_eq!(result.report.of_kind(EventKind::Override).count(), 1);
}

#[test]
fn take_highest_keeps_work_queued_below_a_retired_node() {
    let provider = shared_descendant_universe(false);
    let mut config = config();
    config.resolver.take_highest = true;
    let result = resolve(
        &app(vec![req("x/1.0"), req("q/1.0"), req("c/1.0")]),
        &Profile::new(),
        &provider,
        None,
        &config,
    )
    .unwrap();

    assert_eq!(version_of(&result, "x"), "2.0");
    assert!(result.graph.find("y").is_none());
    assert!(result.graph.find("leaf").is_some());
}

#[test]
fn disagreeing_overrides_conflict() {
    let provider = universe()
        .recipe("a/1.0", {
            let mut r = Recipe::default();
            r.requires.push(req("zlib/1.2.11").with_override());
            r
        })
        .recipe("b/1.0", {
            let mut r = Recipe::default();
            r.requires.push(req("zlib/1.3").with_override());
            r
        });
    let err = resolve(
        &app(vec![req("a/1.0"), req("b/1.0")]),
        &Profile::new(),
        &provider,
        None,
        &config(),
    )
    .unwrap_err();
    assert!(matches!(err, ResolveError::Conflict { ref reason, .. } if reason.contains("overrides")));
}

#[test]
fn same_major_policy_rejects_major_jumps() {
    let provider = MemoryProvider::new()
        .package("fmt/9.1", &[])
        .package("fmt/10.0", &[])
        .package("spdlog/1.0", &["fmt/9.1"]);
    let set = app(vec![req("spdlog/1.0"), req("fmt/10.0").with_override()]);

    let mut cfg = config();
    assert!(resolve(&set, &Profile::new(), &provider, None, &cfg).is_ok());

    cfg.resolver.override_policy = OverridePolicy::SameMajor;
    let err = resolve(&set, &Profile::new(), &provider, None, &cfg).unwrap_err();
    assert!(matches!(err, ResolveError::Conflict { ref reason, .. } if reason.contains("major")));
}

#[test]
fn take_highest_settles_conflicts() {
    let provider = universe()
        .package("a/1.0", &["zlib/1.2.11"])
        .package("b/1.0", &["zlib/1.3"]);
    let mut cfg = config();
    cfg.resolver.take_highest = true;

    for order in [["a/1.0", "b/1.0"], ["b/1.0", "a/1.0"]] {
        let set = app(order.iter().map(|r| req(r)).collect());
        let result = resolve(&set, &Profile::new(), &provider, None, &cfg).unwrap();
        assert_eq!(version_of(&result, "zlib"), "1.3");
        assert_eq!(result.report.of_kind(EventKind::TakeHighest).count(), 1);
    }
}

#[test]
fn cycles_are_reported_with_their_path() {
    let provider = MemoryProvider::new()
        .package("a/1.0", &["b/1.0"])
        .package("b/1.0", &["a/1.0"]);
    let err = resolve(
        &app(vec![req("a/1.0")]),
        &Profile::new(),
        &provider,
        None,
        &config(),
    )
    .unwrap_err();
    match err {
        ResolveError::Cycle { path } => assert_eq!(path, vec!["a/1.0", "b/1.0", "a/1.0"]),
        other => panic!("expected cycle, got {other}"),
    }
}

#[test]
fn unmatched_range_lists_available_versions() {
    let err = resolve(
        &app(vec![req("zlib/[>=5]")]),
        &Profile::new(),
        &universe(),
        None,
        &config(),
    )
    .unwrap_err();
    match err {
        ResolveError::UnresolvableRange {
            name,
            available,
            path,
            ..
        } => {
            assert_eq!(name, "zlib");
            assert_eq!(available, vec!["1.2.11", "1.2.13", "1.3", "1.4-beta"]);
            assert_eq!(path, vec!["app/1.0", "zlib/[>=5]"]);
        }
        other => panic!("expected unresolvable range, got {other}"),
    }
}

#[test]
fn unknown_package_is_not_found_without_retry() {
    let provider = universe();
    let err = resolve(
        &app(vec![req("ghost/1.0")]),
        &Profile::new(),
        &provider,
        None,
        &config(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::ProviderFetch {
            kind: FetchFailure::NotFound,
            ..
        }
    ));
    assert_eq!(provider.recipe_fetches.get(), 1);
}

#[test]
fn transient_failures_are_retried_then_exhausted() {
    let provider = universe().flaky("zlib", 2);
    let result = run(&app(vec![req("zlib/[>=1]")]), &provider);
    assert_eq!(version_of(&result, "zlib"), "1.3");

    let provider = universe().flaky("zlib", 10);
    let err = resolve(
        &app(vec![req("zlib/[>=1]")]),
        &Profile::new(),
        &provider,
        None,
        &config(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::ProviderFetch {
            kind: FetchFailure::TransientExhausted { attempts: 3 },
            ..
        }
    ));
}

#[test]
fn option_directives_follow_precedence() {
    let zlib = Recipe {
        default_options: map(&[("shared", "False"), ("fPIC", "True")]),
        ..Recipe::default()
    };
    let lib = Recipe {
        default_options: map(&[("zlib:shared", "True")]),
        requires: vec![req("zlib/1.3")],
        ..Recipe::default()
    };
    let provider = MemoryProvider::new()
        .recipe("zlib/1.3", zlib)
        .recipe("lib/1.0", lib);
    let set = app(vec![req("lib/1.0")]);
    let options = |result: &ResolutionResult| {
        let idx = result.graph.find("zlib").unwrap();
        result.graph.node(idx).options.clone()
    };

    let result = run(&set, &provider);
    assert_eq!(options(&result), map(&[("fPIC", "True"), ("shared", "True")]));

    let set = set.option("zlib:fPIC", "False");
    let result = run(&set, &provider);
    assert_eq!(options(&result)["fPIC"], "False");

    let profile = Profile::new().option("zlib:shared", "False");
    let result = resolve(&set, &profile, &provider, None, &config()).unwrap();
    assert_eq!(options(&result), map(&[("fPIC", "False"), ("shared", "False")]));
}

#[test]
fn second_requester_with_other_options_is_reported() {
    let zlib = Recipe {
        default_options: map(&[("shared", "False")]),
        ..Recipe::default()
    };
    let provider = MemoryProvider::new()
        .recipe("zlib/1.3", zlib)
        .recipe("a/1.0", {
            let mut r = Recipe::default();
            r.requires.push(req("zlib/1.3").option("shared", "True"));
            r
        })
        .package("b/1.0", &["zlib/1.3"]);
    let result = run(&app(vec![req("a/1.0"), req("b/1.0")]), &provider);

    let idx = result.graph.find("zlib").unwrap();
    assert_eq!(result.graph.node(idx).options["shared"], "True");
    assert_eq!(result.report.of_kind(EventKind::OptionMismatch).count(), 1);
}

#[test]
fn profile_settings_reach_nodes() {
    let provider = universe();
    let profile = Profile::new()
        .setting("os", "Linux")
        .setting("zlib:build_type", "Debug");
    let result = resolve(
        &app(vec![req("zlib/1.3")]),
        &profile,
        &provider,
        None,
        &config(),
    )
    .unwrap();
    let idx = result.graph.find("zlib").unwrap();
    assert_eq!(
        result.graph.node(idx).settings,
        map(&[("build_type", "Debug"), ("os", "Linux")])
    );
}

#[test]
fn coexisting_versions_get_separate_nodes() {
    let provider = MemoryProvider::new()
        .package("boost/1.70", &[])
        .package("boost/1.80", &[])
        .recipe("a/1.0", {
            let mut r = Recipe::default();
            r.requires.push(req("boost/1.70").coexisting());
            r
        })
        .recipe("b/1.0", {
            let mut r = Recipe::default();
            r.requires.push(req("boost/1.80").coexisting());
            r
        });
    let result = run(&app(vec![req("a/1.0"), req("b/1.0")]), &provider);
    assert!(result.graph.find("boost/1.70").is_some());
    assert!(result.graph.find("boost/1.80").is_some());
    assert_eq!(result.graph.len(), 4);
}

#[test]
fn build_and_private_requirements_stay_out_of_the_runtime_closure() {
    let provider = MemoryProvider::new()
        .package("cmake/3.27", &[])
        .package("hidden/1.0", &[])
        .recipe("lib/1.0", {
            let mut r = Recipe::default();
            r.requires.push(req("hidden/1.0").private());
            r
        });
    let set = app(vec![req("lib/1.0"), req("cmake/3.27").build_only()]);
    let result = run(&set, &provider);

    let root = result.graph.root.unwrap();
    let closure: Vec<_> = result
        .graph
        .runtime_closure(root)
        .into_iter()
        .map(|idx| result.graph.node(idx).name().to_string())
        .collect();
    assert_eq!(closure, vec!["lib"]);
    assert!(result.graph.find("cmake").is_some());
}

#[test]
fn identities_do_not_depend_on_expansion_order() {
    let provider = universe()
        .package("a/1.0", &["zlib/[>=1.2]", "c/1.0"])
        .package("b/1.0", &["c/1.0"])
        .package("c/1.0", &["zlib/[>=1.2]"]);
    let forward = run(&app(vec![req("a/1.0"), req("b/1.0")]), &provider);
    let backward = run(&app(vec![req("b/1.0"), req("a/1.0")]), &provider);

    for name in ["a", "b", "c", "zlib"] {
        let id = |r: &ResolutionResult| {
            let idx = r.graph.find(name).unwrap();
            r.graph.node(idx).identity.clone().unwrap()
        };
        assert_eq!(id(&forward), id(&backward), "identity of {name}");
    }
}

#[test]
fn build_requirements_and_insensitive_keys_leave_identity_alone() {
    let with_tool = |tool: &str| {
        let mut r = Recipe {
            binary_insensitive_keys: ["compiler.version".to_string()].into(),
            ..Recipe::default()
        };
        r.requires.push(req(tool).build_only());
        r
    };
    let id = |provider: &MemoryProvider, profile: &Profile| {
        let result = resolve(
            &app(vec![req("pkg/1.0")]),
            profile,
            provider,
            None,
            &config(),
        )
        .unwrap();
        let idx = result.graph.find("pkg").unwrap();
        result.graph.node(idx).identity.clone().unwrap()
    };

    let old_tool = MemoryProvider::new()
        .package("cmake/3.27", &[])
        .recipe("pkg/1.0", with_tool("cmake/3.27"));
    let new_tool = MemoryProvider::new()
        .package("cmake/3.28", &[])
        .recipe("pkg/1.0", with_tool("cmake/3.28"));
    let gcc12 = Profile::new().setting("compiler.version", "12");
    let gcc13 = Profile::new().setting("compiler.version", "13");

    assert_eq!(id(&old_tool, &gcc12), id(&new_tool, &gcc12));
    assert_eq!(id(&old_tool, &gcc12), id(&old_tool, &gcc13));
    assert_ne!(id(&old_tool, &gcc12), id(&old_tool, &Profile::new().setting("os", "Windows")));
}
