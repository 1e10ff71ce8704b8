//! The hardware driver boundary.
//!
//! Terminal instructions translate themselves into calls on a
//! [`LiquidHandlingDriver`]. The core does not interpret or retry
//! hardware failures: a non-OK reply becomes a [`DriverError`] carrying
//! the driver's code and message verbatim.

use crate::error::{AliquotError, DriverError, PlanResult};
use crate::instruction::{
    AddPlateTo, Aspirate, Blowout, Dispense, LoadTips, Message, MixWells, Move, RemovePlateAt,
    RobotInstruction, SetSpeed, UnloadTips,
};

/// A driver's answer to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverReply {
    /// Driver status code; zero means success.
    pub code: i32,
    /// Human-readable status message.
    pub message: String,
}

impl DriverReply {
    /// A successful reply.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: String::new(),
        }
    }

    /// A failure reply with a code and message.
    #[must_use]
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// True if the command succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// The hardware abstraction terminal instructions dispatch onto.
pub trait LiquidHandlingDriver {
    /// Begin a run.
    fn initialize(&mut self) -> DriverReply;
    /// End a run.
    fn finalize(&mut self) -> DriverReply;
    /// Draw liquid into loaded tips.
    fn aspirate(&mut self, cmd: &Aspirate) -> DriverReply;
    /// Push liquid out of loaded tips.
    fn dispense(&mut self, cmd: &Dispense) -> DriverReply;
    /// Expel residual air/liquid.
    fn blowout(&mut self, cmd: &Blowout) -> DriverReply;
    /// Mix in place.
    fn mix(&mut self, cmd: &MixWells) -> DriverReply;
    /// Position the head.
    fn move_to(&mut self, cmd: &Move) -> DriverReply;
    /// Pick up tips.
    fn load_tips(&mut self, cmd: &LoadTips) -> DriverReply;
    /// Eject tips.
    fn unload_tips(&mut self, cmd: &UnloadTips) -> DriverReply;
    /// Set pipetting speeds.
    fn set_speed(&mut self, cmd: &SetSpeed) -> DriverReply;
    /// Show an operator message.
    fn message(&mut self, cmd: &Message) -> DriverReply;
    /// Place a plate on the deck.
    fn add_plate(&mut self, cmd: &AddPlateTo) -> DriverReply;
    /// Clear a deck position.
    fn remove_plate(&mut self, cmd: &RemovePlateAt) -> DriverReply;
}

impl RobotInstruction {
    /// Dispatches this terminal instruction to a driver.
    ///
    /// # Errors
    /// [`DriverError`] on a non-OK reply; an internal error if called on
    /// an unexpanded block variant.
    pub fn output_to(&self, driver: &mut dyn LiquidHandlingDriver) -> PlanResult<()> {
        let reply = match self {
            Self::Initialize => driver.initialize(),
            Self::Finalize => driver.finalize(),
            Self::Aspirate(p) => driver.aspirate(p),
            Self::Dispense(p) => driver.dispense(p),
            Self::Blowout(p) => driver.blowout(p),
            Self::Mix(p) => driver.mix(p),
            Self::Move(p) => driver.move_to(p),
            Self::LoadTips(p) => driver.load_tips(p),
            Self::UnloadTips(p) => driver.unload_tips(p),
            Self::SetSpeed(p) => driver.set_speed(p),
            Self::Message(p) => driver.message(p),
            Self::AddPlateTo(p) => driver.add_plate(p),
            Self::RemovePlateAt(p) => driver.remove_plate(p),
            Self::TransferBlock(_) | Self::SingleChannelBlock(_) | Self::MultiChannelBlock(_) => {
                return Err(AliquotError::internal(format!(
                    "block instruction '{}' dispatched to a driver",
                    self.name()
                )));
            }
        };
        if reply.is_ok() {
            Ok(())
        } else {
            Err(DriverError {
                code: reply.code,
                message: reply.message,
            }
            .into())
        }
    }
}

/// Dispatches a whole terminal instruction list, stopping at the first
/// driver failure.
pub fn dispatch(
    instructions: &[RobotInstruction],
    driver: &mut dyn LiquidHandlingDriver,
) -> PlanResult<()> {
    for instruction in instructions {
        instruction.output_to(driver)?;
    }
    Ok(())
}

/// A driver that records every command, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    /// Names of the commands received, in order.
    pub commands: Vec<String>,
    /// When set, the named command fails with this code.
    pub fail_on: Option<(String, i32)>,
}

impl RecordingDriver {
    /// A driver that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn answer(&mut self, name: &str) -> DriverReply {
        self.commands.push(name.to_string());
        match &self.fail_on {
            Some((fail_name, code)) if fail_name == name => {
                DriverReply::failed(*code, format!("simulated failure in {name}"))
            }
            _ => DriverReply::ok(),
        }
    }
}

impl LiquidHandlingDriver for RecordingDriver {
    fn initialize(&mut self) -> DriverReply {
        self.answer("initialize")
    }
    fn finalize(&mut self) -> DriverReply {
        self.answer("finalize")
    }
    fn aspirate(&mut self, _cmd: &Aspirate) -> DriverReply {
        self.answer("aspirate")
    }
    fn dispense(&mut self, _cmd: &Dispense) -> DriverReply {
        self.answer("dispense")
    }
    fn blowout(&mut self, _cmd: &Blowout) -> DriverReply {
        self.answer("blowout")
    }
    fn mix(&mut self, _cmd: &MixWells) -> DriverReply {
        self.answer("mix")
    }
    fn move_to(&mut self, _cmd: &Move) -> DriverReply {
        self.answer("move")
    }
    fn load_tips(&mut self, _cmd: &LoadTips) -> DriverReply {
        self.answer("load_tips")
    }
    fn unload_tips(&mut self, _cmd: &UnloadTips) -> DriverReply {
        self.answer("unload_tips")
    }
    fn set_speed(&mut self, _cmd: &SetSpeed) -> DriverReply {
        self.answer("set_speed")
    }
    fn message(&mut self, _cmd: &Message) -> DriverReply {
        self.answer("message")
    }
    fn add_plate(&mut self, _cmd: &AddPlateTo) -> DriverReply {
        self.answer("add_plate_to")
    }
    fn remove_plate(&mut self, _cmd: &RemovePlateAt) -> DriverReply {
        self.answer("remove_plate_at")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::TransferBlock;

    #[test]
    fn terminal_dispatch_records_commands() {
        let mut driver = RecordingDriver::new();
        let plan = vec![
            RobotInstruction::Initialize,
            RobotInstruction::Message(Message {
                text: "hello".to_string(),
            }),
            RobotInstruction::Finalize,
        ];
        dispatch(&plan, &mut driver).unwrap();
        assert_eq!(driver.commands, vec!["initialize", "message", "finalize"]);
    }

    #[test]
    fn driver_failure_passes_through_verbatim() {
        let mut driver = RecordingDriver {
            fail_on: Some(("message".to_string(), 42)),
            ..RecordingDriver::default()
        };
        let plan = vec![
            RobotInstruction::Initialize,
            RobotInstruction::Message(Message {
                text: "hello".to_string(),
            }),
            RobotInstruction::Finalize,
        ];
        let err = dispatch(&plan, &mut driver).unwrap_err();
        let AliquotError::Driver(driver_err) = err else {
            panic!("expected a driver error");
        };
        assert_eq!(driver_err.code, 42);
        assert!(driver_err.message.contains("message"));
        // Dispatch stopped at the failure.
        assert_eq!(driver.commands, vec!["initialize", "message"]);
    }

    #[test]
    fn blocks_cannot_be_dispatched() {
        let mut driver = RecordingDriver::new();
        let block = RobotInstruction::TransferBlock(TransferBlock { transfers: vec![] });
        let err = block.output_to(&mut driver).unwrap_err();
        assert!(format!("{err}").contains("block instruction"));
        assert!(driver.commands.is_empty());
    }
}
