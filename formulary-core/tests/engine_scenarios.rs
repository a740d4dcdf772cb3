use formulary_core::{FormulaBuilder, FormulaEngine, FormulaError, IngredientCatalog, Operation};
use formulary_schemas::{
    command::Command,
    formula::{CostPolicy, LinePatch, PlacementDefaults, SectionSpec, SortDirection},
    ingredient::Ingredient,
    rule::ValidationRuleSet,
};
use std::cell::RefCell;
use std::rc::Rc;

fn rose_otto() -> Ingredient {
    let mut rose = Ingredient::leaf("rose-otto", "Rose Otto")
        .with_cas_no("8007-01-0")
        .with_category("Natural", "Floral");
    rose.concentration = Some(20.0);
    rose.cost = Some(95.0);
    rose
}

fn catalog() -> IngredientCatalog {
    IngredientCatalog::new(vec![
        Ingredient::branch(
            "natural",
            "Natural",
            vec![Ingredient::branch(
                "floral",
                "Floral",
                vec![
                    rose_otto(),
                    Ingredient::leaf("jasmine-absolute", "Jasmine Absolute"),
                    Ingredient::leaf("lavender-essential-oil", "Lavender Essential Oil")
                        .with_ifra_category("Category 4"),
                ],
            )],
        ),
        Ingredient::branch(
            "synthetic",
            "Synthetic",
            vec![
                Ingredient::leaf("iso-e-super", "Iso E Super"),
                Ingredient::leaf("hedione", "Hedione"),
            ],
        ),
    ])
}

fn sections_engine(rules: ValidationRuleSet) -> FormulaEngine {
    FormulaBuilder::new()
        .with_rules(rules)
        .build()
        .expect("default sections build")
}

fn trials_engine() -> FormulaEngine {
    FormulaBuilder::new()
        .with_trials()
        .with_placement_defaults(PlacementDefaults {
            cost: CostPolicy::Fixed { value: 25.0 },
            ..PlacementDefaults::default()
        })
        .build()
        .expect("trials build")
}

fn line_ids(engine: &FormulaEngine, container_id: &str) -> Vec<String> {
    engine
        .container_lines(container_id)
        .expect("container exists")
        .iter()
        .map(|l| l.id.clone())
        .collect()
}

fn add(engine: &mut FormulaEngine, container_id: &str, id: &str, concentration: f64) {
    engine
        .add_from_catalog(container_id, &catalog(), id, LinePatch::concentration(concentration))
        .expect("add line");
}

#[test]
fn placed_line_uses_defaults_and_is_validated_after_update() {
    let mut rules = ValidationRuleSet::default();
    rules.individual.concentration.max = 50.0;
    let mut engine = sections_engine(rules);

    let snapshot = engine
        .add_line("top-notes", &rose_otto(), LinePatch::default())
        .expect("add rose otto");
    assert_eq!(snapshot.container_totals("top-notes").map(|t| t.total_concentration), Some(5.0));
    assert_eq!(snapshot.totals.total_quantity, 10.0);
    assert!(snapshot.totals.total_cost >= 10.0 && snapshot.totals.total_cost <= 60.0);

    let snapshot = engine
        .update_line("top-notes", "rose-otto", &LinePatch::concentration(60.0))
        .expect("update rose otto");
    let result = snapshot.validation.get("rose-otto").expect("result recorded");
    assert!(!result.is_valid);
    assert_eq!(result.errors, vec!["Concentration 60% exceeds maximum 50%"]);
}

#[test]
fn duplicate_in_same_section_is_rejected_but_allowed_elsewhere() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    add(&mut engine, "top-notes", "hedione", 5.0);

    let err = engine
        .add_from_catalog("top-notes", &catalog(), "hedione", LinePatch::default())
        .unwrap_err();
    assert_eq!(err.operation(), Some(Operation::AddLine));
    match err {
        FormulaError::DuplicateIngredient {
            operation,
            container_id,
            ingredient_id,
        } => {
            assert_eq!(operation, Operation::AddLine);
            assert_eq!(container_id, "top-notes");
            assert_eq!(ingredient_id, "hedione");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(line_ids(&engine, "top-notes"), vec!["hedione"]);

    add(&mut engine, "base-notes", "hedione", 3.0);
    assert_eq!(engine.snapshot().totals.total_items, 2);
    assert!(engine.snapshot().validation.get_in("base-notes", "hedione").is_some());
}

#[test]
fn sections_over_limit_even_when_each_line_is_fine() {
    let mut rules = ValidationRuleSet::default();
    rules.individual.concentration.max = 70.0;
    let mut engine = sections_engine(rules);
    add(&mut engine, "top-notes", "hedione", 60.0);
    add(&mut engine, "base-notes", "iso-e-super", 60.0);

    let snapshot = engine.snapshot();
    assert!(snapshot.is_over_limit());
    assert_eq!(snapshot.totals.total_concentration, 120.0);
    assert!(snapshot.validation.lines.iter().all(|l| l.result.is_valid));
}

#[test]
fn totals_track_every_mutation() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    add(&mut engine, "top-notes", "hedione", 8.0);
    add(&mut engine, "middle-notes", "jasmine-absolute", 4.0);
    add(&mut engine, "base-notes", "iso-e-super", 12.0);
    engine
        .update_line("middle-notes", "jasmine-absolute", &LinePatch::quantity(30.0))
        .unwrap();
    engine.remove_line("top-notes", "hedione").unwrap();
    engine.move_line("base-notes", "top-notes", "iso-e-super").unwrap();

    let lines = engine.current_lines();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.totals.total_items, lines.len());
    assert_eq!(
        snapshot.totals.total_concentration,
        lines.iter().map(|l| l.concentration).sum::<f64>()
    );
    assert_eq!(snapshot.totals.total_quantity, lines.iter().map(|l| l.quantity).sum::<f64>());
    assert_eq!(snapshot.totals.total_cost, lines.iter().map(|l| l.cost).sum::<f64>());
    assert_eq!(snapshot.container_totals("base-notes").map(|t| t.total_items), Some(0));
}

#[test]
fn removing_a_missing_line_is_a_no_op() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    add(&mut engine, "top-notes", "hedione", 5.0);
    let revision = engine.snapshot().revision;
    let snapshot = engine.remove_line("top-notes", "oakmoss").expect("no-op");
    assert_eq!(snapshot.totals.total_items, 1);
    assert_eq!(snapshot.revision, revision + 1);
}

#[test]
fn updating_a_missing_line_is_signalled() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    let err = engine
        .update_line("top-notes", "oakmoss", &LinePatch::concentration(2.0))
        .unwrap_err();
    assert!(matches!(
        err,
        FormulaError::LineNotFound { operation: Operation::UpdateLine, ref line_id, .. } if line_id == "oakmoss"
    ));
}

#[test]
fn unknown_container_is_signalled() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    let err = engine
        .add_line("heart", &rose_otto(), LinePatch::default())
        .unwrap_err();
    assert!(matches!(err, FormulaError::ContainerNotFound { .. }));
    assert_eq!(engine.snapshot().revision, 0);
}

#[test]
fn move_keeps_values_and_tolerates_stale_sources() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    engine
        .add_line(
            "top-notes",
            &rose_otto(),
            LinePatch::concentration(12.5).with_quantity(40.0).with_cost(33.0),
        )
        .unwrap();

    engine.move_line("top-notes", "base-notes", "rose-otto").unwrap();
    assert!(line_ids(&engine, "top-notes").is_empty());
    let moved = &engine.container_lines("base-notes").unwrap()[0];
    assert_eq!((moved.concentration, moved.quantity, moved.cost), (12.5, 40.0, 33.0));

    // The drag source no longer holds the line.
    engine.move_line("top-notes", "middle-notes", "rose-otto").unwrap();
    assert_eq!(line_ids(&engine, "base-notes"), vec!["rose-otto"]);
    assert!(line_ids(&engine, "middle-notes").is_empty());

    engine.move_line("base-notes", "base-notes", "rose-otto").unwrap();
    assert_eq!(line_ids(&engine, "base-notes"), vec!["rose-otto"]);
}

#[test]
fn move_into_a_section_holding_the_same_id_is_rejected() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    add(&mut engine, "top-notes", "hedione", 5.0);
    add(&mut engine, "base-notes", "hedione", 7.0);
    let err = engine.move_line("top-notes", "base-notes", "hedione").unwrap_err();
    assert!(matches!(err, FormulaError::DuplicateIngredient { .. }));
    assert_eq!(line_ids(&engine, "top-notes"), vec!["hedione"]);
    assert_eq!(line_ids(&engine, "base-notes"), vec!["hedione"]);
}

#[test]
fn reorder_clamps_indices() {
    let mut engine = trials_engine();
    for id in ["hedione", "iso-e-super", "jasmine-absolute"] {
        add(&mut engine, "trial-1", id, 5.0);
    }
    engine.reorder_line("trial-1", 0, 2).unwrap();
    assert_eq!(line_ids(&engine, "trial-1"), vec!["iso-e-super", "jasmine-absolute", "hedione"]);

    engine.reorder_line("trial-1", 99, 0).unwrap();
    assert_eq!(line_ids(&engine, "trial-1"), vec!["hedione", "iso-e-super", "jasmine-absolute"]);

    engine.reorder_line("trial-1", 1, 1).unwrap();
    assert_eq!(line_ids(&engine, "trial-1"), vec!["hedione", "iso-e-super", "jasmine-absolute"]);
}

#[test]
fn configure_sections_keeps_surviving_lines() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    add(&mut engine, "top-notes", "hedione", 5.0);
    add(&mut engine, "base-notes", "iso-e-super", 5.0);

    engine
        .configure_sections(vec![
            SectionSpec::new("base-notes", "Fond", "30-40%"),
            SectionSpec::new("accord", "Accord", "5-10%"),
        ])
        .unwrap();

    let names: Vec<&str> = engine.sections().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Fond", "Accord"]);
    assert_eq!(line_ids(&engine, "base-notes"), vec!["iso-e-super"]);
    assert!(line_ids(&engine, "accord").is_empty());
    assert!(engine.container_lines("top-notes").is_none());
    assert_eq!(engine.snapshot().totals.total_items, 1);
}

#[test]
fn empty_section_configuration_is_rejected() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    add(&mut engine, "top-notes", "hedione", 5.0);
    let err = engine.configure_sections(Vec::new()).unwrap_err();
    assert!(matches!(err, FormulaError::InvalidConfiguration { .. }));
    assert_eq!(engine.sections().len(), 3);
    assert_eq!(line_ids(&engine, "top-notes"), vec!["hedione"]);

    assert!(FormulaBuilder::new().with_sections(Vec::new()).build().is_err());
}

#[test]
fn new_trial_becomes_active_and_leaves_others_alone() {
    let mut engine = trials_engine();
    add(&mut engine, "trial-1", "hedione", 5.0);
    add(&mut engine, "trial-1", "iso-e-super", 10.0);

    let snapshot = engine.add_trial().unwrap();
    assert_eq!(snapshot.active_container_id.as_deref(), Some("trial-2"));
    assert_eq!(snapshot.totals.total_items, 0);
    let active = engine.active_trial().unwrap();
    assert_eq!(active.name, "Trial 2");
    assert!(active.lines.is_empty());
    assert_eq!(line_ids(&engine, "trial-1"), vec!["hedione", "iso-e-super"]);

    let snapshot = engine.switch_active_trial("trial-1").unwrap();
    assert_eq!(snapshot.totals.total_items, 2);
    assert_eq!(snapshot.totals.total_concentration, 15.0);
    assert_eq!(snapshot.totals.total_cost, 50.0);
    assert_eq!(engine.current_lines().len(), 2);
}

#[test]
fn trials_validate_only_the_active_list() {
    let mut engine = trials_engine();
    add(&mut engine, "trial-1", "hedione", 80.0);
    assert_eq!(engine.snapshot().validation.error_count(), 1);

    engine.add_trial().unwrap();
    add(&mut engine, "trial-2", "hedione", 5.0);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.validation.error_count(), 0);
    assert_eq!(snapshot.validation.lines.len(), 1);
    assert_eq!(snapshot.container_totals("trial-1").map(|t| t.total_concentration), Some(80.0));
}

#[test]
fn last_trial_cannot_be_deleted() {
    let mut engine = trials_engine();
    let err = engine.delete_trial("trial-1").unwrap_err();
    assert!(matches!(
        err,
        FormulaError::LastTrial { operation: Operation::DeleteTrial, ref trial_id } if trial_id == "trial-1"
    ));
    assert_eq!(engine.trials().len(), 1);
}

#[test]
fn deleting_the_active_trial_selects_its_predecessor() {
    let mut engine = trials_engine();
    engine.add_trial().unwrap();
    engine.add_trial().unwrap();
    assert_eq!(engine.snapshot().active_container_id.as_deref(), Some("trial-3"));

    engine.delete_trial("trial-3").unwrap();
    assert_eq!(engine.snapshot().active_container_id.as_deref(), Some("trial-2"));

    engine.switch_active_trial("trial-1").unwrap();
    engine.delete_trial("trial-1").unwrap();
    assert_eq!(engine.snapshot().active_container_id.as_deref(), Some("trial-2"));

    engine.add_trial().unwrap();
    engine.delete_trial("trial-2").unwrap();
    assert_eq!(engine.snapshot().active_container_id.as_deref(), Some("trial-4"));
}

#[test]
fn deleting_an_inactive_trial_keeps_the_focus() {
    let mut engine = trials_engine();
    engine.add_trial().unwrap();
    engine.delete_trial("trial-1").unwrap();
    assert_eq!(engine.snapshot().active_container_id.as_deref(), Some("trial-2"));
    assert_eq!(engine.trials().len(), 1);
}

#[test]
fn trial_uniqueness_covers_the_whole_trial() {
    let mut engine = trials_engine();
    add(&mut engine, "trial-1", "hedione", 5.0);
    let err = engine
        .add_from_catalog("trial-1", &catalog(), "hedione", LinePatch::default())
        .unwrap_err();
    assert!(matches!(err, FormulaError::DuplicateIngredient { .. }));
    assert_eq!(engine.used_ingredient_ids().len(), 1);
}

#[test]
fn rename_trims_and_rejects_blank_names() {
    let mut engine = trials_engine();
    engine.rename_trial("trial-1", "  Summer draft ").unwrap();
    assert_eq!(engine.trials()[0].name, "Summer draft");
    assert!(matches!(
        engine.rename_trial("trial-1", "   ").unwrap_err(),
        FormulaError::InvalidConfiguration { .. }
    ));
    assert_eq!(engine.trials()[0].name, "Summer draft");
}

#[test]
fn mode_specific_operations_are_refused() {
    let mut sections = sections_engine(ValidationRuleSet::default());
    assert!(matches!(
        sections.add_trial().unwrap_err(),
        FormulaError::UnsupportedInMode { operation: Operation::AddTrial, .. }
    ));

    let mut trials = trials_engine();
    assert!(matches!(
        trials.move_line("trial-1", "trial-2", "hedione").unwrap_err(),
        FormulaError::UnsupportedInMode { operation: Operation::MoveLine, .. }
    ));
    assert!(trials.configure_sections(vec![SectionSpec::new("a", "A", "1%")]).is_err());
}

#[test]
fn clearing_a_sort_restores_manual_order() {
    let mut engine = trials_engine();
    add(&mut engine, "trial-1", "hedione", 10.0);
    add(&mut engine, "trial-1", "iso-e-super", 5.0);
    add(&mut engine, "trial-1", "jasmine-absolute", 20.0);

    let sorted: Vec<&str> = engine
        .sort_container("trial-1", "concentration", SortDirection::Descending)
        .unwrap()
        .iter()
        .map(|l| l.id.as_str())
        .collect();
    assert_eq!(sorted, vec!["jasmine-absolute", "hedione", "iso-e-super"]);

    assert_eq!(line_ids(&engine, "trial-1"), vec!["hedione", "iso-e-super", "jasmine-absolute"]);
    let order: Vec<&str> = engine
        .snapshot()
        .validation
        .lines
        .iter()
        .map(|l| l.line_id.as_str())
        .collect();
    assert_eq!(order, vec!["hedione", "iso-e-super", "jasmine-absolute"]);
    assert!(engine.sort_container("trial-9", "name", SortDirection::Ascending).is_err());
}

#[test]
fn catalog_drops_must_name_a_leaf() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    assert!(matches!(
        engine
            .add_from_catalog("top-notes", &catalog(), "floral", LinePatch::default())
            .unwrap_err(),
        FormulaError::NotALeaf(_)
    ));
    assert!(matches!(
        engine
            .add_from_catalog("top-notes", &catalog(), "oud", LinePatch::default())
            .unwrap_err(),
        FormulaError::IngredientNotFound(_)
    ));
}

#[test]
fn placed_lines_are_copies_of_the_catalog_entry() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    let mut rose = rose_otto();
    engine.add_line("top-notes", &rose, LinePatch::default()).unwrap();
    rose.name = "Renamed".to_string();
    assert_eq!(engine.container_lines("top-notes").unwrap()[0].name, "Rose Otto");
}

#[test]
fn swapping_rules_revalidates() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    add(&mut engine, "top-notes", "lavender-essential-oil", 5.0);
    assert!(engine.snapshot().validation.get("lavender-essential-oil").unwrap().is_valid);

    let rules = ValidationRuleSet::default().with_ifra_category("Category 4", 1.5, "Fine fragrance");
    let snapshot = engine.set_rules(rules).unwrap();
    let result = snapshot.validation.get("lavender-essential-oil").unwrap();
    assert_eq!(result.errors, vec!["IFRA Category Category 4 limits this ingredient to 1.5%"]);
}

#[test]
fn numeric_ifra_override_still_triggers_the_category_cap() {
    let rules = ValidationRuleSet::default().with_ifra_category("4", 2.0, "Fine fragrance");
    let mut engine = sections_engine(rules);
    add(&mut engine, "top-notes", "hedione", 10.0);

    let patch: LinePatch = serde_yaml::from_str("attributes: { ifra_category: 4 }").unwrap();
    let snapshot = engine.update_line("top-notes", "hedione", &patch).unwrap();
    assert_eq!(
        snapshot.validation.get("hedione").unwrap().errors,
        vec!["IFRA Category 4 limits this ingredient to 2%"]
    );
    let line = &engine.container_lines("top-notes").unwrap()[0];
    assert_eq!(line.ifra_category.as_deref(), Some("4"));
    assert!(!line.attributes.contains_key("ifra_category"));

    let revision = engine.snapshot().revision;
    let patch: LinePatch =
        serde_yaml::from_str("{ concentration: 1, attributes: { ifra_category: [4, 5] } }").unwrap();
    let err = engine.update_line("top-notes", "hedione", &patch).unwrap_err();
    assert!(matches!(
        err,
        FormulaError::InvalidOverride { operation: Operation::UpdateLine, ref field, .. } if field == "ifra_category"
    ));
    let line = &engine.container_lines("top-notes").unwrap()[0];
    assert_eq!(line.ifra_category.as_deref(), Some("4"));
    assert_eq!(line.concentration, 10.0);
    assert_eq!(engine.snapshot().revision, revision);
}

#[test]
fn descriptive_overrides_replace_line_fields() {
    let mut engine = sections_engine(ValidationRuleSet::default());
    add(&mut engine, "top-notes", "rose-otto", 4.0);
    add(&mut engine, "top-notes", "hedione", 4.0);

    let patch: LinePatch = serde_yaml::from_str(
        "attributes: { name: Rose Absolute, cas_no: 90106-38-0, subcategory: Rose, intensity: 9/10 }",
    )
    .unwrap();
    engine.update_line("top-notes", "rose-otto", &patch).unwrap();

    let line = &engine.container_lines("top-notes").unwrap()[0];
    assert_eq!(line.name, "Rose Absolute");
    assert_eq!(line.cas_no.as_deref(), Some("90106-38-0"));
    assert_eq!(line.category.as_deref(), Some("Natural"));
    assert_eq!(line.subcategory.as_deref(), Some("Rose"));
    assert_eq!(line.attributes.keys().collect::<Vec<_>>(), vec!["intensity"]);

    let sorted = engine
        .sort_container("top-notes", "name", SortDirection::Ascending)
        .unwrap();
    assert_eq!(sorted.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(), vec!["Hedione", "Rose Absolute"]);

    let blank_name: LinePatch = serde_yaml::from_str("attributes: { name: null }").unwrap();
    assert!(matches!(
        engine.update_line("top-notes", "rose-otto", &blank_name),
        Err(FormulaError::InvalidOverride { .. })
    ));
}

#[test]
fn listeners_fire_once_per_successful_operation() {
    let seen: Rc<RefCell<Vec<(Operation, u64)>>> = Rc::new(RefCell::new(Vec::new()));
    let mut engine = trials_engine();
    let sink = Rc::clone(&seen);
    engine.subscribe(move |op, snapshot| sink.borrow_mut().push((op, snapshot.revision)));

    add(&mut engine, "trial-1", "hedione", 5.0);
    assert!(engine.delete_trial("trial-1").is_err());
    engine.add_trial().unwrap();

    assert_eq!(*seen.borrow(), vec![(Operation::AddLine, 1), (Operation::AddTrial, 2)]);
}

#[test]
fn recorded_commands_replay_through_the_engine() {
    let script = r#"
- type: drop
  source: { kind: palette, ingredient_id: hedione }
  destination: top-notes
- type: add_line
  container_id: base-notes
  ingredient_id: iso-e-super
  patch: { concentration: 12 }
- type: drop
  source: { kind: container, container_id: top-notes, line_id: hedione }
  destination: middle-notes
- type: update_line
  container_id: middle-notes
  line_id: hedione
  patch: { quantity: 25 }
"#;
    let commands: Vec<Command> = serde_yaml::from_str(script).expect("valid script");
    let catalog = catalog();
    let mut engine = sections_engine(ValidationRuleSet::default());
    for command in commands {
        engine.execute(command, &catalog).expect("command applies");
    }

    assert!(line_ids(&engine, "top-notes").is_empty());
    assert_eq!(line_ids(&engine, "middle-notes"), vec!["hedione"]);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.totals.total_concentration, 17.0);
    assert_eq!(snapshot.totals.total_quantity, 35.0);
    assert_eq!(snapshot.revision, 4);
}

#[test]
fn operation_log_gets_a_row_per_operation() {
    let path = std::env::temp_dir().join(format!("formulary_oplog_{}.csv", std::process::id()));
    let path_str = path.to_str().unwrap().to_string();
    {
        let mut engine = FormulaBuilder::new()
            .with_trials()
            .with_operation_log_to_file(&path_str)
            .build()
            .unwrap();
        add(&mut engine, "trial-1", "hedione", 5.0);
        engine.add_trial().unwrap();
    }
    let mut reader = csv::Reader::from_path(&path).unwrap();
    let operations: Vec<String> = reader
        .records()
        .map(|r| r.unwrap().get(1).unwrap().to_string())
        .collect();
    assert_eq!(operations, vec!["initial", "add_line", "add_trial"]);
    std::fs::remove_file(&path).ok();
}
