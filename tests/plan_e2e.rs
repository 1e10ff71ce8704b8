//! End-to-end planning: logical chain -> terminal instructions.

use aliquot::{
    from_json, simulate, to_json_pretty, Adaptor, AliquotError, ChannelParams, FlowRate, Head,
    InstructionTree, Inventory, Liquid, LogicalInstruction, Orientation, PlanArtifact,
    PlanContext, PlanningError, PlateId, PlateType, PolicyRuleSet, RobotConfig, RobotInstruction,
    SelectionError, Volume, WellAddress,
};

fn four_channel_head() -> Head {
    Head {
        name: "left".to_string(),
        adaptor: Adaptor {
            name: "std".to_string(),
            accepts_tips: vec!["tip_200".to_string()],
        },
        params: ChannelParams {
            name: "LoVol".to_string(),
            min_volume: Volume::ul(0.5),
            max_volume: Volume::ul(1000.0),
            min_flow: FlowRate::ul_per_s(0.1),
            max_flow: FlowRate::ul_per_s(500.0),
            multiplicity: 4,
            orientation: Orientation::Vertical,
            independent: false,
            pitch_mm: 9.0,
        },
    }
}

/// A trough whose whole contents are reachable, for scenario tests.
fn open_trough() -> PlateType {
    PlateType {
        name: "open_trough".to_string(),
        rows: 8,
        cols: 1,
        well_capacity: Volume::ml(10.0),
        well_residual: Volume::ZERO,
        well_pitch_mm: 9.0,
        trough: true,
    }
}

struct Rig {
    config: RobotConfig,
    source: PlateId,
    dest: PlateId,
}

fn rig(stock_ul: f64) -> Rig {
    let inv = Inventory::with_standard_types();
    let mut config = RobotConfig::new(vec![four_channel_head()], Vec::new());
    config.add_tipbox("position_4", inv.new_tipbox("tipbox_200").unwrap());
    config.add_tipwaste("position_5", inv.new_tipwaste("tipwaste").unwrap());

    let mut trough = aliquot::Plate::new("water_trough", open_trough());
    trough.fill_well(WellAddress::new(0, 0), Volume::ul(stock_ul), "water");
    let source = config.add_plate("position_1", trough);
    let dest = config.add_plate("position_2", inv.new_plate("pcrplate_96").unwrap());
    Rig {
        config,
        source,
        dest,
    }
}

fn water_mix(rig: &Rig, dest_well: WellAddress, vol: f64, generation: u32) -> LogicalInstruction {
    let input = Liquid::builder()
        .name("water")
        .volume(Volume::ul(vol))
        .location(rig.source, WellAddress::new(0, 0))
        .build()
        .unwrap();
    let output = Liquid::builder()
        .name(format!("aliquot_{}{}", dest_well, generation))
        .liquid_class("water")
        .volume(Volume::ul(vol))
        .build()
        .unwrap();
    LogicalInstruction::mix(vec![input], output, generation).with_destination(
        rig.dest,
        dest_well,
        "pcrplate_96",
    )
}

#[test]
fn four_parallel_transfers_become_one_batch() {
    let r = rig(500.0);
    let chain: Vec<LogicalInstruction> = (0..4)
        .map(|row| water_mix(&r, WellAddress::new(row, 0), 100.0, 0))
        .collect();

    let ctx = PlanContext::default();
    let mut tree = InstructionTree::build(&chain, &ctx).unwrap();
    let plan = tree.generate(&r.config, &PolicyRuleSet::standard()).unwrap();

    // One batched aspirate across four channels, one batched dispense.
    let aspirates: Vec<_> = plan
        .instructions
        .iter()
        .filter_map(|i| match i {
            RobotInstruction::Aspirate(a) => Some(a),
            _ => None,
        })
        .collect();
    assert_eq!(aspirates.len(), 1);
    assert_eq!(aspirates[0].channels, vec![0, 1, 2, 3]);
    assert!(aspirates[0].volumes.iter().all(|v| v.approx_eq(Volume::ul(100.0))));

    let dispenses = plan
        .instructions
        .iter()
        .filter(|i| matches!(i, RobotInstruction::Dispense(_)))
        .count();
    assert_eq!(dispenses, 1);

    // The simulation is clean and the stock ends at 100ul.
    let report = simulate(&plan.instructions, &r.config);
    assert!(report.passed(), "{report}");
    assert!(report.diagnostics.is_empty());
    assert!(report.final_state.plates[&r.source]
        .well_volume(WellAddress::new(0, 0))
        .approx_eq(Volume::ul(100.0)));
    for row in 0..4 {
        assert!(report.final_state.plates[&r.dest]
            .well_volume(WellAddress::new(row, 0))
            .approx_eq(Volume::ul(100.0)));
    }
}

#[test]
fn sub_minimum_volume_aborts_planning() {
    let r = rig(500.0);
    let chain = vec![water_mix(&r, WellAddress::new(0, 0), 0.2, 0)];
    let ctx = PlanContext::default();
    let mut tree = InstructionTree::build(&chain, &ctx).unwrap();
    let err = tree
        .generate(&r.config, &PolicyRuleSet::standard())
        .unwrap_err();
    assert!(matches!(
        err,
        AliquotError::Planning(PlanningError::Selection(
            SelectionError::NoSuitableChannel { .. }
        ))
    ));
}

#[test]
fn tree_shape_invariant() {
    let r = rig(500.0);
    let chain: Vec<LogicalInstruction> = (0..3)
        .map(|row| water_mix(&r, WellAddress::new(row, 0), 50.0, 0))
        .collect();
    let ctx = PlanContext::default();
    let mut tree = InstructionTree::build(&chain, &ctx).unwrap();
    let plan = tree.generate(&r.config, &PolicyRuleSet::standard()).unwrap();

    assert_eq!(plan.instructions.first(), Some(&RobotInstruction::Initialize));
    assert_eq!(plan.instructions.last(), Some(&RobotInstruction::Finalize));
    let initializes = plan
        .instructions
        .iter()
        .filter(|i| matches!(i, RobotInstruction::Initialize))
        .count();
    let finalizes = plan
        .instructions
        .iter()
        .filter(|i| matches!(i, RobotInstruction::Finalize))
        .count();
    assert_eq!((initializes, finalizes), (1, 1));
    assert!(plan.instructions.iter().all(RobotInstruction::is_terminal));
}

#[test]
fn multi_generation_chain_keeps_causal_order() {
    let r = rig(2000.0);
    let chain = vec![
        water_mix(&r, WellAddress::new(0, 0), 100.0, 0),
        LogicalInstruction::prompt("spin the plate", 1),
        water_mix(&r, WellAddress::new(1, 0), 100.0, 2),
    ];
    let ctx = PlanContext::default();
    let mut tree = InstructionTree::build(&chain, &ctx).unwrap();
    let plan = tree.generate(&r.config, &PolicyRuleSet::standard()).unwrap();

    let message_at = plan
        .instructions
        .iter()
        .position(|i| matches!(i, RobotInstruction::Message(_)))
        .unwrap();
    let first_dispense = plan
        .instructions
        .iter()
        .position(|i| matches!(i, RobotInstruction::Dispense(_)))
        .unwrap();
    let last_dispense = plan
        .instructions
        .iter()
        .rposition(|i| matches!(i, RobotInstruction::Dispense(_)))
        .unwrap();
    assert!(first_dispense < message_at);
    assert!(message_at < last_dispense);
}

#[test]
fn artifact_roundtrip_preserves_the_plan() {
    let r = rig(500.0);
    let chain: Vec<LogicalInstruction> = (0..4)
        .map(|row| water_mix(&r, WellAddress::new(row, 0), 100.0, 0))
        .collect();
    let ctx = PlanContext::default();
    let mut tree = InstructionTree::build(&chain, &ctx).unwrap();
    let plan = tree.generate(&r.config, &PolicyRuleSet::standard()).unwrap();

    let artifact = PlanArtifact::new(plan.instructions.clone());
    let json = to_json_pretty(&artifact).unwrap();
    let parsed = from_json(&json).unwrap();
    assert_eq!(parsed.instructions, plan.instructions);

    // The parsed plan simulates to the same final state.
    let original = simulate(&plan.instructions, &r.config);
    let replayed = simulate(&parsed.instructions, &r.config);
    assert_eq!(original.final_state, replayed.final_state);
}

#[test]
fn replanning_is_idempotent() {
    let r = rig(500.0);
    let chain: Vec<LogicalInstruction> = (0..4)
        .map(|row| water_mix(&r, WellAddress::new(row, 0), 100.0, 0))
        .collect();
    let ctx = PlanContext::default();
    let mut tree = InstructionTree::build(&chain, &ctx).unwrap();
    let first = tree.generate(&r.config, &PolicyRuleSet::standard()).unwrap();
    let second = tree.generate(&r.config, &PolicyRuleSet::standard()).unwrap();

    assert_eq!(first.instructions, second.instructions);
    let a = simulate(&first.instructions, &r.config);
    let b = simulate(&second.instructions, &r.config);
    assert_eq!(a.final_state, b.final_state);
}

#[test]
fn glycerol_plan_carries_policy_behaviour() {
    let inv = Inventory::with_standard_types();
    let mut config = RobotConfig::new(vec![four_channel_head()], Vec::new());
    config.add_tipbox("position_4", inv.new_tipbox("tipbox_200").unwrap());
    config.add_tipwaste("position_5", inv.new_tipwaste("tipwaste").unwrap());
    let mut source_plate = inv.new_plate("deepwell_96").unwrap();
    source_plate.fill_well(WellAddress::new(0, 0), Volume::ul(1000.0), "glycerol");
    let source = config.add_plate("position_1", source_plate);
    let dest = config.add_plate("position_2", inv.new_plate("pcrplate_96").unwrap());

    let input = Liquid::builder()
        .name("glycerol")
        .volume(Volume::ul(50.0))
        .location(source, WellAddress::new(0, 0))
        .build()
        .unwrap();
    let output = Liquid::builder()
        .name("glycerol_shot")
        .liquid_class("glycerol")
        .volume(Volume::ul(50.0))
        .build()
        .unwrap();
    let chain = vec![LogicalInstruction::mix(vec![input], output, 0).with_destination(
        dest,
        WellAddress::new(0, 0),
        "pcrplate_96",
    )];

    let ctx = PlanContext::default();
    let mut tree = InstructionTree::build(&chain, &ctx).unwrap();
    let plan = tree.generate(&config, &PolicyRuleSet::standard()).unwrap();

    // Glycerol sets pipetting speeds and post-mixes.
    assert!(plan
        .instructions
        .iter()
        .any(|i| matches!(i, RobotInstruction::SetSpeed(_))));
    assert!(plan
        .instructions
        .iter()
        .any(|i| matches!(i, RobotInstruction::Mix(m) if m.cycles == 3)));
    let report = simulate(&plan.instructions, &config);
    assert!(report.passed(), "{report}");
}
