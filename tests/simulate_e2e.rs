//! End-to-end validation: generated plans replayed on the virtual robot.

use aliquot::instruction::LoadTips;
use aliquot::{
    simulate, Adaptor, ChannelParams, FlowRate, Head, InstructionTree, Inventory, Liquid,
    LogicalInstruction, Orientation, PlanContext, PlateId, PolicyRuleSet, RobotConfig,
    RobotInstruction, Severity, Volume, WellAddress,
};

fn single_channel_head() -> Head {
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
            multiplicity: 1,
            orientation: Orientation::Vertical,
            independent: true,
            pitch_mm: 9.0,
        },
    }
}

struct Rig {
    config: RobotConfig,
    source: PlateId,
    dest: PlateId,
}

fn rig() -> Rig {
    let inv = Inventory::with_standard_types();
    let mut config = RobotConfig::new(vec![single_channel_head()], Vec::new());
    config.add_tipbox("position_4", inv.new_tipbox("tipbox_200").unwrap());
    config.add_tipwaste("position_5", inv.new_tipwaste("tipwaste").unwrap());
    let mut source_plate = inv.new_plate("deepwell_96").unwrap();
    source_plate.fill_well(WellAddress::new(0, 0), Volume::ul(1000.0), "water");
    let source = config.add_plate("position_1", source_plate);
    let dest = config.add_plate("position_2", inv.new_plate("pcrplate_96").unwrap());
    Rig {
        config,
        source,
        dest,
    }
}

fn plan_one_transfer(r: &Rig, vol: f64) -> Vec<RobotInstruction> {
    let input = Liquid::builder()
        .name("water")
        .volume(Volume::ul(vol))
        .location(r.source, WellAddress::new(0, 0))
        .build()
        .unwrap();
    let output = Liquid::builder()
        .name("shot")
        .liquid_class("water")
        .volume(Volume::ul(vol))
        .build()
        .unwrap();
    let chain = vec![LogicalInstruction::mix(vec![input], output, 0).with_destination(
        r.dest,
        WellAddress::new(0, 0),
        "pcrplate_96",
    )];
    let ctx = PlanContext::default();
    let mut tree = InstructionTree::build(&chain, &ctx).unwrap();
    tree.generate(&r.config, &PolicyRuleSet::standard())
        .unwrap()
        .instructions
}

#[test]
fn generated_plan_simulates_clean() {
    let r = rig();
    let plan = plan_one_transfer(&r, 100.0);
    let report = simulate(&plan, &r.config);
    assert!(report.passed(), "{report}");
    assert!(report.diagnostics.is_empty());
    assert!(report.final_state.plates[&r.dest]
        .well_volume(WellAddress::new(0, 0))
        .approx_eq(Volume::ul(100.0)));
}

#[test]
fn duplicate_load_tips_fails_the_verdict_but_not_the_run() {
    let r = rig();
    let mut plan = plan_one_transfer(&r, 100.0);

    // Inject a second LoadTips right after the first.
    let load_at = plan
        .iter()
        .position(|i| matches!(i, RobotInstruction::LoadTips(_)))
        .unwrap();
    let RobotInstruction::LoadTips(original) = &plan[load_at] else {
        unreachable!();
    };
    let duplicate = RobotInstruction::LoadTips(LoadTips {
        head: original.head,
        channels: original.channels.clone(),
        tip_type: original.tip_type.clone(),
        tipbox: original.tipbox,
    });
    plan.insert(load_at + 1, duplicate);

    let report = simulate(&plan, &r.config);
    assert!(!report.passed());
    assert_eq!(report.worst(), Some(Severity::Error));
    assert!(report
        .at(Severity::Error)
        .iter()
        .any(|d| d.message.contains("already carries a tip")));
    // The rest of the plan still executed: liquid reached the dest.
    assert!(report.final_state.plates[&r.dest]
        .well_volume(WellAddress::new(0, 0))
        .approx_eq(Volume::ul(100.0)));
}

#[test]
fn one_run_surfaces_every_problem() {
    let r = rig();
    let mut plan = plan_one_transfer(&r, 100.0);

    // Break the plan twice: drop the LoadTips and the final UnloadTips.
    plan.retain(|i| {
        !matches!(
            i,
            RobotInstruction::LoadTips(_) | RobotInstruction::UnloadTips(_)
        )
    });
    let report = simulate(&plan, &r.config);
    assert!(!report.passed());
    // Both the aspirate and the dispense complain about the missing tip.
    assert!(report.at(Severity::Error).len() >= 2);
}

#[test]
fn split_volume_transfer_simulates_clean() {
    // 500ul on a 200ul tip takes three strokes; the replay must still
    // conserve volume end to end.
    let inv = Inventory::with_standard_types();
    let mut config = RobotConfig::new(vec![single_channel_head()], Vec::new());
    config.add_tipbox("position_4", inv.new_tipbox("tipbox_200").unwrap());
    config.add_tipwaste("position_5", inv.new_tipwaste("tipwaste").unwrap());
    let mut source_plate = inv.new_plate("deepwell_96").unwrap();
    source_plate.fill_well(WellAddress::new(0, 0), Volume::ul(1000.0), "water");
    let source = config.add_plate("position_1", source_plate);
    let dest = config.add_plate("position_2", inv.new_plate("deepwell_96").unwrap());

    let input = Liquid::builder()
        .name("water")
        .volume(Volume::ul(500.0))
        .location(source, WellAddress::new(0, 0))
        .build()
        .unwrap();
    let output = Liquid::builder()
        .name("pool")
        .liquid_class("water")
        .volume(Volume::ul(500.0))
        .build()
        .unwrap();
    let chain = vec![LogicalInstruction::mix(vec![input], output, 0).with_destination(
        dest,
        WellAddress::new(0, 0),
        "deepwell_96",
    )];
    let ctx = PlanContext::default();
    let mut tree = InstructionTree::build(&chain, &ctx).unwrap();
    let plan = tree
        .generate(&config, &PolicyRuleSet::standard())
        .unwrap()
        .instructions;

    let report = simulate(&plan, &config);
    assert!(report.passed(), "{report}");
    assert_eq!(
        plan.iter()
            .filter(|i| matches!(i, RobotInstruction::Aspirate(_)))
            .count(),
        3
    );
    let dispensed: Volume = plan
        .iter()
        .filter_map(|i| match i {
            RobotInstruction::Dispense(d) => Some(d.volumes.iter().copied().sum()),
            _ => None,
        })
        .sum();
    assert!(dispensed.approx_eq(Volume::ul(500.0)));
    assert!(report.final_state.plates[&dest]
        .well_volume(WellAddress::new(0, 0))
        .approx_eq(Volume::ul(500.0)));
}
