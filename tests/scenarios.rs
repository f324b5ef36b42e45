//! Scenario runner and cross-persona verification against the simulator

use async_trait::async_trait;

use saucedemo_harness::compare::{CollectInventory, Divergence, PersonaOperation, ViolationKind};
use saucedemo_harness::config::Timeouts;
use saucedemo_harness::pages::{CartPage, InventoryPage, LoginPage};
use saucedemo_harness::persona::QuirkObservation;
use saucedemo_harness::product::CartLineItem;
use saucedemo_harness::scenario::LOCKED_OUT_BANNER;
use saucedemo_harness::sim::{SIM_BASE_URL, Storefront};
use saucedemo_harness::{
    ComparativeVerifier, ComparisonPolicy, FieldPolicy, HarnessConfig, HarnessError,
    HarnessResult, Persona, PersonaRegistry, QuirkKind, Scenario, ScenarioRunner, Session,
};

fn config() -> HarnessConfig {
    HarnessConfig {
        base_url: SIM_BASE_URL.to_string(),
        ..HarnessConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn every_scenario_passes_for_its_default_personas() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    for scenario in Scenario::ALL {
        let personas = scenario.personas(&registry, None);
        let outcomes = runner.run(scenario, &personas).await;
        assert!(!outcomes.is_empty(), "{scenario} produced no outcome");
        for outcome in outcomes {
            assert!(outcome.passed, "{outcome}");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn login_outcome_per_persona() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    let personas = registry
        .lookup_all(&["standard", "performance"])
        .unwrap();
    let outcomes = runner.run(Scenario::Login, &personas).await;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].personas, vec!["standard"]);
    assert_eq!(outcomes[1].personas, vec!["performance"]);
    assert!(outcomes[1].elapsed_ms >= config.login_delay_threshold_ms);
    assert!(outcomes.iter().all(|o| o.quirk.is_none()));
}

#[tokio::test(start_paused = true)]
async fn locked_out_persona_fails_the_login_scenario() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    let locked = registry.lookup("locked").unwrap();
    let outcomes = runner.run(Scenario::Login, &[locked]).await;
    assert!(!outcomes[0].passed);
    assert!(outcomes[0].detail.contains("locked out"), "{}", outcomes[0]);

    let outcomes = runner.run(Scenario::LockedOut, &[locked]).await;
    assert!(outcomes[0].passed, "{}", outcomes[0]);

    // A persona that gets in breaks the locked-out expectation.
    let standard = registry.baseline();
    let outcomes = runner.run(Scenario::LockedOut, &[standard]).await;
    assert!(!outcomes[0].passed);
    assert!(outcomes[0].detail.contains("was let in"), "{}", outcomes[0]);
}

#[tokio::test(start_paused = true)]
async fn locked_out_needs_the_locked_out_banner() {
    let config = config();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    let locked = PersonaRegistry::seeded().lookup("locked").unwrap().clone();
    let outcome = runner.run(Scenario::LockedOut, &[&locked]).await.remove(0);
    assert!(outcome.passed, "{outcome}");
    assert!(outcome.detail.contains(LOCKED_OUT_BANNER), "{outcome}");

    // Refused for another reason: a banner, but the wrong one.
    let wrong_password = Persona {
        password: "not_the_sauce",
        ..locked
    };
    let outcome = runner
        .run(Scenario::LockedOut, &[&wrong_password])
        .await
        .remove(0);
    assert!(!outcome.passed);
    assert!(outcome.detail.contains("banner reads"), "{outcome}");
    assert!(outcome.detail.contains("do not match any user"), "{outcome}");
    assert!(outcome.detail.contains("at sim://saucedemo/v1/index.html"), "{outcome}");
}

#[tokio::test(start_paused = true)]
async fn full_cart_cycles_every_product_for_each_persona() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    let personas = Scenario::FullCart.personas(&registry, None);
    let outcomes = runner.run(Scenario::FullCart, &personas).await;
    assert_eq!(outcomes.len(), 3);
    for outcome in &outcomes {
        assert!(outcome.passed, "{outcome}");
        assert_eq!(outcome.detail, "6 items added and removed");
    }
    // Only the inventory listing is used, where removal works for everyone.
    assert_eq!(outcomes[1].personas, vec!["problem"]);
    assert_eq!(outcomes[1].quirk, Some(QuirkObservation::NotManifested));
}

#[tokio::test(start_paused = true)]
async fn checkout_handoff_times_navigation_for_the_delayed_persona() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    let personas = registry.lookup_all(&["standard", "performance"]).unwrap();
    let outcomes = runner.run(Scenario::CheckoutHandoff, &personas).await;
    assert!(outcomes.iter().all(|o| o.passed), "{outcomes:?}");
    assert_eq!(outcomes[0].detail, "checkout form ready");
    let timed = &outcomes[1].detail;
    assert!(timed.starts_with("checkout form ready; cart in "), "{timed}");
    assert!(timed.contains(" ms, checkout in "), "{timed}");
    assert!(timed.ends_with(" ms"), "{timed}");
}

#[tokio::test(start_paused = true)]
async fn every_session_is_released() {
    let config = HarnessConfig {
        timeouts: Timeouts {
            scenario_ms: 1_000,
            ..Timeouts::default()
        },
        ..config()
    };
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    // Passing, failing and timed-out runs all hand their session back.
    let standard = registry.baseline();
    let locked = registry.lookup("locked").unwrap();
    let performance = registry.lookup("performance").unwrap();
    assert!(runner.run(Scenario::Catalog, &[standard]).await[0].passed);
    assert!(!runner.run(Scenario::Login, &[locked]).await[0].passed);
    assert!(!runner.run(Scenario::Login, &[performance]).await[0].passed);
    assert_eq!(storefront.live_sessions(), 0);

    let outcome = runner
        .run(Scenario::CrossPersona, &[standard, performance])
        .await
        .remove(0);
    assert_eq!(outcome.detail, "scenario `cross-persona` exceeded 1s");
    assert_eq!(storefront.live_sessions(), 0);

    let verifier = ComparativeVerifier::new(&storefront, &config);
    verifier
        .verify(
            &CollectInventory,
            &[standard, locked],
            &ComparisonPolicy::products(),
        )
        .await
        .unwrap_err();
    assert_eq!(storefront.live_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn flaky_cart_removal_is_observed_not_failed() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);
    let problem = registry.lookup("problem").unwrap();

    let outcome = runner
        .run(Scenario::CartContents, &[problem])
        .await
        .remove(0);
    assert!(outcome.passed, "{outcome}");
    assert_eq!(outcome.quirk, Some(QuirkObservation::Manifested));
    assert!(outcome.detail.contains("removal ignored"), "{outcome}");

    // Removal from the inventory listing still works for the same persona.
    let outcome = runner
        .run(Scenario::CartRoundTrip, &[problem])
        .await
        .remove(0);
    assert!(outcome.passed, "{outcome}");
    assert_eq!(outcome.quirk, Some(QuirkObservation::NotManifested));
}

#[tokio::test(start_paused = true)]
async fn cross_persona_reports_uniform_image_corruption() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    let personas = Scenario::CrossPersona.personas(&registry, None);
    let outcomes = runner.run(Scenario::CrossPersona, &personas).await;
    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert!(outcome.passed, "{outcome}");
    assert_eq!(outcome.personas, vec!["standard", "problem", "performance"]);
    assert!(outcome.detail.contains("uniform corruption"), "{outcome}");
    assert!(outcome.detail.contains("image_reference"), "{outcome}");
}

#[tokio::test(start_paused = true)]
async fn scenario_budget_stops_a_slow_login() {
    let config = HarnessConfig {
        timeouts: Timeouts {
            scenario_ms: 1_000,
            ..Timeouts::default()
        },
        ..config()
    };
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    let performance = registry.lookup("performance").unwrap();
    let outcome = runner.run(Scenario::Login, &[performance]).await.remove(0);
    assert!(!outcome.passed);
    assert_eq!(outcome.detail, "scenario `login` exceeded 1s");
    assert!(outcome.elapsed_ms >= 1_000);
}

#[tokio::test(start_paused = true)]
async fn outcomes_serialize_for_reports() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let runner = ScenarioRunner::new(&storefront, &config);

    let outcome = runner
        .run(Scenario::Catalog, &[registry.baseline()])
        .await
        .remove(0);
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["scenario"], "catalog");
    assert_eq!(json["personas"], serde_json::json!(["standard"]));
    assert_eq!(json["passed"], true);
    assert_eq!(json["detail"], "6 products, cart 0");
    assert!(json.get("quirk").is_none());
}

#[tokio::test(start_paused = true)]
async fn verifier_report_lists_every_field_per_pair() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let verifier = ComparativeVerifier::new(&storefront, &config);

    let personas = registry.lookup_all(&["standard", "problem"]).unwrap();
    let report = verifier
        .verify(&CollectInventory, &personas, &ComparisonPolicy::products())
        .await
        .unwrap();

    insta::assert_snapshot!(report.to_string(), @r#"
    inventory listing across standard, problem
      standard vs problem `name` MUST_MATCH: identical
      standard vs problem `description` MUST_MATCH: identical
      standard vs problem `price` MUST_MATCH: identical
      standard vs problem `image_reference` MAY_DIFFER: uniform corruption (6/6 rows = "./img/sl-404.168b1cce.jpg")
    "#);
}

#[tokio::test(start_paused = true)]
async fn uniform_collapse_without_permission_is_a_violation() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let verifier = ComparativeVerifier::new(&storefront, &config);

    let strict = ComparisonPolicy::new(FieldPolicy::MustMatch).when_quirk(
        QuirkKind::VisualCorruption,
        "image_reference",
        FieldPolicy::MustDiffer,
    );
    let personas = registry.lookup_all(&["standard", "problem"]).unwrap();
    let err = verifier
        .verify(&CollectInventory, &personas, &strict)
        .await
        .unwrap_err();
    match err {
        HarnessError::PolicyViolation(violations) => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].field, Some("image_reference"));
            assert!(matches!(
                violations[0].kind,
                ViolationKind::UniformCollapse { .. }
            ));
        }
        other => panic!("Expected PolicyViolation, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn baseline_and_delayed_persona_agree_on_everything() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let verifier = ComparativeVerifier::new(&storefront, &config);

    let personas = registry.lookup_all(&["standard", "performance"]).unwrap();
    let report = verifier
        .verify(&CollectInventory, &personas, &ComparisonPolicy::products())
        .await
        .unwrap();
    assert_eq!(report.comparisons.len(), 4);
    assert_eq!(report.divergent().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unreachable_persona_aborts_verification() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let verifier = ComparativeVerifier::new(&storefront, &config);

    let personas = registry.lookup_all(&["standard", "locked"]).unwrap();
    let err = verifier
        .verify(&CollectInventory, &personas, &ComparisonPolicy::products())
        .await
        .unwrap_err();
    assert!(
        matches!(err, HarnessError::UnexpectedState { page: "login", .. }),
        "{err:?}"
    );
}

/// Adds two products and reads the cart rows back
struct CollectCart;

#[async_trait]
impl<S: Session> PersonaOperation<S> for CollectCart {
    type Output = CartLineItem;

    fn name(&self) -> &'static str {
        "cart rows"
    }

    async fn run(
        &self,
        session: &S,
        config: &HarnessConfig,
        persona: &Persona,
    ) -> HarnessResult<Vec<CartLineItem>> {
        let login = LoginPage::new(session, config);
        login.navigate().await?;
        login.login(persona.credentials()).await?;

        let inventory = InventoryPage::new(session, config);
        inventory.add_item_by_name("Sauce Labs Bolt T-Shirt").await?;
        inventory.add_item_by_name("Sauce Labs Onesie").await?;
        inventory.go_to_cart().await?;
        CartPage::new(session, config).items().await
    }
}

#[tokio::test(start_paused = true)]
async fn custom_operation_compares_cart_rows() {
    let config = config();
    let registry = PersonaRegistry::seeded();
    let storefront = Storefront::default();
    let verifier = ComparativeVerifier::new(&storefront, &config);

    let personas = registry
        .lookup_all(&["standard", "problem", "performance"])
        .unwrap();
    let report = verifier
        .verify(
            &CollectCart,
            &personas,
            &ComparisonPolicy::new(FieldPolicy::MustMatch),
        )
        .await
        .unwrap();
    assert_eq!(report.operation, "cart rows");
    // Three pairs, two fields each.
    assert_eq!(report.comparisons.len(), 6);
    assert!(
        report
            .comparisons
            .iter()
            .all(|c| c.divergence == Divergence::Identical)
    );
}
