//! The instruction tree: from logical layers to terminal instructions.
//!
//! Build walks the dependency-ordered chain of logical instructions and
//! turns each generation layer into root-level nodes: prompts become
//! messages, all-split layers are applied directly to the plan context
//! without emitting anything, and everything else becomes a transfer
//! block. Generation then repeatedly refines nodes against a duplicated
//! robot configuration until only terminals remain, bracketing the
//! output with Initialize/Finalize.
//!
//! Nodes live in an arena indexed by position, and the refinement walk
//! is an explicit work list rather than call-stack recursion, so large
//! protocols cannot overflow the stack.

use crate::context::PlanContext;
use crate::error::{AliquotError, DecomposeError, PlanResult, PlanningError};
use crate::instruction::{
    Message, Refinement, RobotInstruction, TransferBlock, TransferRequest,
};
use crate::logical::{layers, LogicalInstruction, LogicalKind};
use crate::policy::PolicyRuleSet;
use crate::resources::deck::RobotConfig;
use crate::units::Volume;

/// One node of the instruction tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// The instruction this node owns.
    pub instruction: RobotInstruction,
    /// Arena indices of the node's children, in execution order.
    pub children: Vec<usize>,
}

/// The generated output of a tree walk.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    /// Terminal instructions in execution order, Initialize first and
    /// Finalize last.
    pub instructions: Vec<RobotInstruction>,
    /// The robot configuration after all planned movements.
    pub final_config: RobotConfig,
}

/// An instruction tree: a rootless sentinel over ordered top nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionTree {
    nodes: Vec<TreeNode>,
    roots: Vec<usize>,
    /// Arena length right after build; generation resets to this.
    built: usize,
}

impl InstructionTree {
    /// Builds a tree from a dependency-ordered logical chain.
    ///
    /// Split layers are applied to `context` (re-registering output
    /// liquids at the input's location) and contribute no nodes. A
    /// layer mixing split and non-split instructions is a fatal
    /// chain-consistency error.
    pub fn build(chain: &[LogicalInstruction], context: &PlanContext) -> PlanResult<Self> {
        let mut tree = Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            built: 0,
        };

        for layer in layers(chain) {
            let splits = layer
                .iter()
                .filter(|i| i.kind == LogicalKind::Split)
                .count();
            if splits > 0 && splits < layer.len() {
                return Err(PlanningError::MixedSplitLayer {
                    generation: layer[0].generation,
                }
                .into());
            }
            if splits == layer.len() && splits > 0 {
                for instr in layer {
                    apply_split(instr, context)?;
                }
                continue;
            }

            let mut transfers = Vec::new();
            for instr in layer {
                match instr.kind {
                    LogicalKind::Prompt => {
                        let text = instr.message.clone().unwrap_or_default();
                        tree.push_root(RobotInstruction::Message(Message { text }));
                    }
                    LogicalKind::Mix => {
                        transfers.extend(mix_transfers(instr, context)?);
                    }
                    LogicalKind::Split => {
                        // Excluded above; layers are split-only or split-free.
                    }
                }
            }
            if !transfers.is_empty() {
                tree.push_root(RobotInstruction::TransferBlock(TransferBlock { transfers }));
            }
        }
        tree.built = tree.nodes.len();
        Ok(tree)
    }

    fn push_root(&mut self, instruction: RobotInstruction) {
        let idx = self.nodes.len();
        self.nodes.push(TreeNode {
            instruction,
            children: Vec::new(),
        });
        self.roots.push(idx);
    }

    /// Arena indices of the top-level nodes.
    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// A node by arena index.
    #[must_use]
    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    /// Total nodes in the arena (grows during generation).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Refines the tree to terminals against a copy of `config`.
    ///
    /// The passed configuration is never mutated; all liquid and tip
    /// movements land on the duplicate returned in the plan. Calling
    /// this again with the same configuration yields the same
    /// instruction sequence.
    pub fn generate(
        &mut self,
        config: &RobotConfig,
        ruleset: &PolicyRuleSet,
    ) -> PlanResult<GeneratedPlan> {
        // Discard any expansion from a previous pass so repeated
        // generation does not accumulate orphaned subtrees.
        self.nodes.truncate(self.built);
        for node in &mut self.nodes {
            node.children.clear();
        }

        let mut cfg = config.clone();
        let mut out = vec![RobotInstruction::Initialize];

        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            let instruction = self.nodes[idx].instruction.clone();
            match instruction.refine(&mut cfg, ruleset)? {
                Refinement::Terminal => {
                    instruction
                        .validate()
                        .map_err(|e| AliquotError::internal(e.to_string()))?;
                    out.push(instruction);
                }
                Refinement::Children(children) => {
                    let mut child_indices = Vec::with_capacity(children.len());
                    for child in children {
                        let child_idx = self.nodes.len();
                        self.nodes.push(TreeNode {
                            instruction: child,
                            children: Vec::new(),
                        });
                        child_indices.push(child_idx);
                    }
                    for &child_idx in child_indices.iter().rev() {
                        stack.push(child_idx);
                    }
                    self.nodes[idx].children = child_indices;
                }
            }
        }

        out.push(RobotInstruction::Finalize);
        Ok(GeneratedPlan {
            instructions: out,
            final_config: cfg,
        })
    }
}

/// Applies a split to the context: every output liquid inherits the
/// input's location. No robot instruction is emitted.
fn apply_split(instr: &LogicalInstruction, context: &PlanContext) -> PlanResult<()> {
    let input = instr
        .inputs
        .first()
        .ok_or_else(|| AliquotError::internal(format!("split with no input: {}", instr.summary())))?;
    let location = input
        .location
        .or_else(|| context.location_of(input.id))
        .ok_or_else(|| PlanningError::UnplacedLiquid {
            liquid: input.summary(),
        })?;
    for output in &instr.outputs {
        context.record_location(output.id, location);
    }
    Ok(())
}

/// Turns one mix into transfer requests, checking volume conservation
/// and recording the output's location.
fn mix_transfers(
    instr: &LogicalInstruction,
    context: &PlanContext,
) -> PlanResult<Vec<TransferRequest>> {
    let dest = instr
        .destination
        .as_ref()
        .ok_or_else(|| PlanningError::MissingDestination {
            instruction: instr.summary(),
        })?;
    let output = instr
        .outputs
        .first()
        .ok_or_else(|| AliquotError::internal(format!("mix with no output: {}", instr.summary())))?;

    let input_sum: Volume = instr.inputs.iter().map(|l| l.volume).sum();
    if !input_sum.approx_eq(output.volume) {
        return Err(DecomposeError::VolumeMismatch {
            instruction: instr.summary(),
            input_sum,
            declared: output.volume,
        }
        .into());
    }

    let mut transfers = Vec::with_capacity(instr.inputs.len());
    for input in &instr.inputs {
        let from = input
            .location
            .or_else(|| context.location_of(input.id))
            .ok_or_else(|| PlanningError::UnplacedLiquid {
                liquid: input.summary(),
            })?;
        transfers.push(TransferRequest {
            what: input.liquid_class.clone(),
            liquid: input.id,
            from_plate: from.plate,
            from_well: from.well,
            to_plate: dest.plate,
            to_well: dest.well,
            volume: input.volume,
            from_volume: None,
            to_volume: None,
        });
    }
    context.record_location(
        output.id,
        crate::liquid::LiquidLocation {
            plate: dest.plate,
            well: dest.well,
        },
    );
    Ok(transfers)
}
