//! Effect command interface
//!
//! The framework drives an effect through numbered commands carrying a raw
//! command buffer and an optional reply buffer. Each command has fixed size
//! rules; a violation is rejected before the equalizer is touched. Parameter
//! commands report per-parameter failures through the status word in the
//! reply rather than through the command result.

use crate::equalizer::EqualizerEffect;
use crate::error::{EffectError, Result};
use crate::params::{value_offset, ParamHeader, PARAM_HEADER_SIZE};
use soul_core::IoHandle;
use tracing::{debug, trace};

/// Size of a 32-bit `effect_config_t`
pub const EFFECT_CONFIG_SIZE: usize = 64;

/// Smallest parameter block: header plus one parameter word
pub const MIN_PARAM_BLOCK_SIZE: usize = PARAM_HEADER_SIZE + 4;

/// `[is_offload u8][pad x3][io handle i32]`
pub const OFFLOAD_COMMAND_SIZE: usize = 8;

const STATUS_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectCommand {
    Init,
    SetConfig,
    Reset,
    Enable,
    Disable,
    SetParam,
    GetParam,
    SetDevice,
    SetVolume,
    SetAudioMode,
    GetConfig,
    Offload,
}

impl EffectCommand {
    pub fn from_code(code: u32) -> Option<Self> {
        let command = match code {
            0 => Self::Init,
            1 => Self::SetConfig,
            2 => Self::Reset,
            3 => Self::Enable,
            4 => Self::Disable,
            5 => Self::SetParam,
            8 => Self::GetParam,
            9 => Self::SetDevice,
            10 => Self::SetVolume,
            11 => Self::SetAudioMode,
            14 => Self::GetConfig,
            20 => Self::Offload,
            _ => return None,
        };
        Some(command)
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Init => 0,
            Self::SetConfig => 1,
            Self::Reset => 2,
            Self::Enable => 3,
            Self::Disable => 4,
            Self::SetParam => 5,
            Self::GetParam => 8,
            Self::SetDevice => 9,
            Self::SetVolume => 10,
            Self::SetAudioMode => 11,
            Self::GetConfig => 14,
            Self::Offload => 20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::SetConfig => "SET_CONFIG",
            Self::Reset => "RESET",
            Self::Enable => "ENABLE",
            Self::Disable => "DISABLE",
            Self::SetParam => "SET_PARAM",
            Self::GetParam => "GET_PARAM",
            Self::SetDevice => "SET_DEVICE",
            Self::SetVolume => "SET_VOLUME",
            Self::SetAudioMode => "SET_AUDIO_MODE",
            Self::GetConfig => "GET_CONFIG",
            Self::Offload => "OFFLOAD",
        }
    }
}

fn size_error(command: EffectCommand, cmd: &[u8], reply: Option<&[u8]>) -> EffectError {
    EffectError::CommandSize {
        command: command.name(),
        command_size: cmd.len(),
        reply_size: reply.map_or(0, <[u8]>::len),
    }
}

fn write_status(reply: &mut [u8], status: i32) -> usize {
    reply[..STATUS_SIZE].copy_from_slice(&status.to_le_bytes());
    STATUS_SIZE
}

fn status_of(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.status(),
    }
}

impl EqualizerEffect {
    /// Execute one framework command, returning the reply bytes written
    pub fn command(&self, code: u32, cmd: &[u8], reply: Option<&mut [u8]>) -> Result<usize> {
        let command = EffectCommand::from_code(code).ok_or(EffectError::UnknownCommand(code))?;
        trace!(
            command = command.name(),
            cmd_size = cmd.len(),
            reply_size = reply.as_deref().map_or(0, <[u8]>::len),
            "effect command"
        );

        match command {
            EffectCommand::Init => {
                let reply = exact_reply(command, cmd, reply, STATUS_SIZE)?;
                Ok(write_status(reply, 0))
            }
            EffectCommand::SetConfig => {
                if cmd.len() != EFFECT_CONFIG_SIZE {
                    return Err(size_error(command, cmd, reply.as_deref()));
                }
                let reply = exact_reply(command, cmd, reply, STATUS_SIZE)?;
                self.set_config(cmd);
                Ok(write_status(reply, 0))
            }
            EffectCommand::GetConfig => {
                let reply = exact_reply(command, cmd, reply, EFFECT_CONFIG_SIZE)?;
                match self.config() {
                    Some(config) => reply.copy_from_slice(&config),
                    None => reply.fill(0),
                }
                Ok(EFFECT_CONFIG_SIZE)
            }
            EffectCommand::Reset => Ok(0),
            EffectCommand::Enable | EffectCommand::Disable => {
                let reply = exact_reply(command, cmd, reply, STATUS_SIZE)?;
                let status = status_of(self.set_enabled(command == EffectCommand::Enable));
                Ok(write_status(reply, status))
            }
            EffectCommand::GetParam => self.get_param_command(cmd, reply),
            EffectCommand::SetParam => {
                if cmd.len() < MIN_PARAM_BLOCK_SIZE {
                    return Err(size_error(command, cmd, reply.as_deref()));
                }
                let reply = exact_reply(command, cmd, reply, STATUS_SIZE)?;
                let header = ParamHeader::read(cmd)?;
                let param_end = PARAM_HEADER_SIZE + header.psize;
                let value_start = PARAM_HEADER_SIZE + value_offset(header.psize);
                let value_end = value_start + header.vsize;
                if cmd.len() < value_end {
                    return Err(EffectError::ParameterTooShort {
                        needed: value_end,
                        actual: cmd.len(),
                    });
                }
                let status = status_of(
                    self.set_parameter(&cmd[PARAM_HEADER_SIZE..param_end], &cmd[value_start..value_end]),
                );
                Ok(write_status(reply, status))
            }
            EffectCommand::Offload => {
                if cmd.len() < OFFLOAD_COMMAND_SIZE {
                    return Err(size_error(command, cmd, reply.as_deref()));
                }
                let offloaded = cmd[0] != 0;
                let io = IoHandle(i32::from_le_bytes([cmd[4], cmd[5], cmd[6], cmd[7]]));
                self.set_offloaded(offloaded, io)?;
                match reply {
                    Some(reply) if reply.len() >= STATUS_SIZE => Ok(write_status(reply, 0)),
                    _ => Ok(0),
                }
            }
            EffectCommand::SetDevice | EffectCommand::SetVolume | EffectCommand::SetAudioMode => {
                debug!(command = command.name(), "ignored");
                Ok(0)
            }
        }
    }

    /// `GET_PARAM`: echo the header and parameter, fill in status, value and
    /// the value size actually written
    fn get_param_command(&self, cmd: &[u8], reply: Option<&mut [u8]>) -> Result<usize> {
        let command = EffectCommand::GetParam;
        let reply = match reply {
            Some(reply) if reply.len() >= MIN_PARAM_BLOCK_SIZE && cmd.len() >= MIN_PARAM_BLOCK_SIZE => {
                reply
            }
            other => return Err(size_error(command, cmd, other.as_deref())),
        };

        let header = ParamHeader::read(cmd)?;
        let param_end = PARAM_HEADER_SIZE + header.psize;
        let value_start = PARAM_HEADER_SIZE + value_offset(header.psize);
        if cmd.len() < param_end || reply.len() < value_start {
            return Err(size_error(command, cmd, Some(&*reply)));
        }
        reply[..param_end].copy_from_slice(&cmd[..param_end]);

        let capacity = header.vsize.min(reply.len() - value_start);
        let (head, value) = reply.split_at_mut(value_start);
        let (status, vsize) =
            match self.get_parameter(&head[PARAM_HEADER_SIZE..param_end], &mut value[..capacity]) {
                Ok(written) => (0, written),
                Err(e) => (e.status(), 0),
            };

        ParamHeader {
            status,
            psize: header.psize,
            vsize,
        }
        .write(head);
        Ok(value_start + vsize)
    }
}

/// Reply buffer that must be present and exactly `size` bytes
fn exact_reply<'a>(
    command: EffectCommand,
    cmd: &[u8],
    reply: Option<&'a mut [u8]>,
    size: usize,
) -> Result<&'a mut [u8]> {
    match reply {
        Some(reply) if reply.len() == size => Ok(reply),
        other => Err(size_error(command, cmd, other.as_deref())),
    }
}
