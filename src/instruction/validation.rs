//! Structural validation of individual instructions.
//!
//! These checks are shape-only: channel lists must be non-empty,
//! strictly ascending, and sized consistently with their volume and
//! well lists; volumes must be non-negative; operator messages are
//! length-capped. Resource existence and liquid accounting are the
//! simulator's job, not validation's.

use thiserror::Error;

use crate::instruction::RobotInstruction;

/// Maximum length of an operator message, in bytes.
pub const MAX_TEXT_LEN: usize = 16 * 1024;

/// A structural defect in a single instruction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// An instruction that addresses channels addresses none.
    #[error("{instruction}: empty channel list")]
    NoChannels {
        /// Name of the offending instruction.
        instruction: &'static str,
    },

    /// Channel indices are not strictly ascending.
    #[error("{instruction}: channel list is not strictly ascending")]
    UnorderedChannels {
        /// Name of the offending instruction.
        instruction: &'static str,
    },

    /// Parallel lists disagree on length.
    #[error("{instruction}: {left_name} has {left} entries but {right_name} has {right}")]
    LengthMismatch {
        /// Name of the offending instruction.
        instruction: &'static str,
        /// First list name.
        left_name: &'static str,
        /// First list length.
        left: usize,
        /// Second list name.
        right_name: &'static str,
        /// Second list length.
        right: usize,
    },

    /// A volume is negative.
    #[error("{instruction}: negative volume at index {index}")]
    NegativeVolume {
        /// Name of the offending instruction.
        instruction: &'static str,
        /// Position of the bad volume.
        index: usize,
    },

    /// An operator message exceeds [`MAX_TEXT_LEN`].
    #[error("message text is {len} bytes, limit is {MAX_TEXT_LEN}")]
    TextTooLong {
        /// Actual text length.
        len: usize,
    },

    /// A block instruction leaked into a terminal-only stream.
    #[error("{instruction}: block instruction in terminal stream")]
    NotTerminal {
        /// Name of the offending instruction.
        instruction: &'static str,
    },
}

fn check_channels(
    instruction: &'static str,
    channels: &[u8],
) -> Result<(), ValidationError> {
    if channels.is_empty() {
        return Err(ValidationError::NoChannels { instruction });
    }
    if !channels.windows(2).all(|w| w[0] < w[1]) {
        return Err(ValidationError::UnorderedChannels { instruction });
    }
    Ok(())
}

fn check_lengths(
    instruction: &'static str,
    left_name: &'static str,
    left: usize,
    right_name: &'static str,
    right: usize,
) -> Result<(), ValidationError> {
    if left == right {
        Ok(())
    } else {
        Err(ValidationError::LengthMismatch {
            instruction,
            left_name,
            left,
            right_name,
            right,
        })
    }
}

fn check_volumes(
    instruction: &'static str,
    volumes: &[crate::units::Volume],
) -> Result<(), ValidationError> {
    for (index, v) in volumes.iter().enumerate() {
        if v.is_negative() {
            return Err(ValidationError::NegativeVolume { instruction, index });
        }
    }
    Ok(())
}

impl RobotInstruction {
    /// Validates this instruction's internal shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name();
        match self {
            Self::Aspirate(p) => {
                check_channels(name, &p.channels)?;
                check_lengths(name, "channels", p.channels.len(), "volumes", p.volumes.len())?;
                check_lengths(name, "channels", p.channels.len(), "wells", p.wells.len())?;
                check_volumes(name, &p.volumes)
            }
            Self::Dispense(p) => {
                check_channels(name, &p.channels)?;
                check_lengths(name, "channels", p.channels.len(), "volumes", p.volumes.len())?;
                check_lengths(name, "channels", p.channels.len(), "wells", p.wells.len())?;
                check_volumes(name, &p.volumes)
            }
            Self::Blowout(p) => {
                check_channels(name, &p.channels)?;
                check_lengths(name, "channels", p.channels.len(), "wells", p.wells.len())
            }
            Self::Mix(p) => {
                check_channels(name, &p.channels)?;
                check_lengths(name, "channels", p.channels.len(), "wells", p.wells.len())?;
                check_volumes(name, std::slice::from_ref(&p.volume))
            }
            Self::Move(p) => {
                if p.wells.is_empty() {
                    return Err(ValidationError::NoChannels { instruction: name });
                }
                Ok(())
            }
            Self::LoadTips(p) => check_channels(name, &p.channels),
            Self::UnloadTips(p) => check_channels(name, &p.channels),
            Self::Message(p) => {
                if p.text.len() > MAX_TEXT_LEN {
                    return Err(ValidationError::TextTooLong { len: p.text.len() });
                }
                Ok(())
            }
            Self::TransferBlock(_) | Self::SingleChannelBlock(_) | Self::MultiChannelBlock(_) => {
                Err(ValidationError::NotTerminal { instruction: name })
            }
            Self::SetSpeed(_)
            | Self::Initialize
            | Self::Finalize
            | Self::AddPlateTo(_)
            | Self::RemovePlateAt(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Aspirate, Message, MixWells, TransferBlock};
    use crate::resources::plate::{PlateId, WellAddress};
    use crate::units::Volume;

    fn aspirate(channels: Vec<u8>, volumes: Vec<Volume>, wells: Vec<WellAddress>) -> RobotInstruction {
        RobotInstruction::Aspirate(Aspirate {
            head: 0,
            channels,
            volumes,
            plate: PlateId::new(),
            wells,
            what: "water".to_string(),
            flow_rate: None,
        })
    }

    #[test]
    fn well_formed_aspirate_passes() {
        let instr = aspirate(
            vec![0, 1],
            vec![Volume::ul(50.0), Volume::ul(50.0)],
            vec![WellAddress::new(0, 0), WellAddress::new(1, 0)],
        );
        assert!(instr.validate().is_ok());
    }

    #[test]
    fn empty_channels_rejected() {
        let instr = aspirate(vec![], vec![], vec![]);
        assert_eq!(
            instr.validate(),
            Err(ValidationError::NoChannels {
                instruction: "aspirate"
            })
        );
    }

    #[test]
    fn duplicate_channels_rejected() {
        let instr = aspirate(
            vec![1, 1],
            vec![Volume::ul(50.0), Volume::ul(50.0)],
            vec![WellAddress::new(0, 0), WellAddress::new(1, 0)],
        );
        assert!(matches!(
            instr.validate(),
            Err(ValidationError::UnorderedChannels { .. })
        ));
    }

    #[test]
    fn length_mismatch_rejected() {
        let instr = aspirate(
            vec![0, 1],
            vec![Volume::ul(50.0)],
            vec![WellAddress::new(0, 0), WellAddress::new(1, 0)],
        );
        assert!(matches!(
            instr.validate(),
            Err(ValidationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn negative_mix_volume_rejected() {
        let instr = RobotInstruction::Mix(MixWells {
            head: 0,
            channels: vec![0],
            volume: Volume::ul(-5.0),
            cycles: 3,
            plate: PlateId::new(),
            wells: vec![WellAddress::new(0, 0)],
        });
        assert!(matches!(
            instr.validate(),
            Err(ValidationError::NegativeVolume { .. })
        ));
    }

    #[test]
    fn oversized_message_rejected() {
        let instr = RobotInstruction::Message(Message {
            text: "x".repeat(MAX_TEXT_LEN + 1),
        });
        assert!(matches!(
            instr.validate(),
            Err(ValidationError::TextTooLong { .. })
        ));
        let ok = RobotInstruction::Message(Message {
            text: "x".repeat(MAX_TEXT_LEN),
        });
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn blocks_are_not_terminal_stream_material() {
        let instr = RobotInstruction::TransferBlock(TransferBlock { transfers: vec![] });
        assert!(matches!(
            instr.validate(),
            Err(ValidationError::NotTerminal { .. })
        ));
    }
}
