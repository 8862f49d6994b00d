// src/protocol/opcode.rs

use std::fmt;

/// Frame opcode. The four assigned control codes sit below
/// [`OpCode::APPLICATION_START`]; the rest of that range (0x05..=0x0f) is
/// reserved for future control codes and currently decodes as
/// [`OpCode::Application`], passing through to the consumer. Application
/// traffic uses values at or above [`OpCode::APPLICATION_START`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Hello,
    Welcome,
    Ping,
    Pong,
    Application(u8),
}

impl OpCode {
    pub const HELLO: u8 = 0x01;
    pub const WELCOME: u8 = 0x02;
    pub const PING: u8 = 0x03;
    pub const PONG: u8 = 0x04;
    /// First opcode value available to application frames.
    pub const APPLICATION_START: u8 = 0x10;

    pub fn from_u8(raw: u8) -> Self {
        match raw {
            Self::HELLO => OpCode::Hello,
            Self::WELCOME => OpCode::Welcome,
            Self::PING => OpCode::Ping,
            Self::PONG => OpCode::Pong,
            // Unassigned values, the reserved 0x05..=0x0f gap included,
            // decode as application traffic.
            other => OpCode::Application(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            OpCode::Hello => Self::HELLO,
            OpCode::Welcome => Self::WELCOME,
            OpCode::Ping => Self::PING,
            OpCode::Pong => Self::PONG,
            OpCode::Application(raw) => raw,
        }
    }

    /// True only for the four assigned control codes. Reserved-range values
    /// decode as [`OpCode::Application`] and so count as non-control.
    pub fn is_control(self) -> bool {
        !matches!(self, OpCode::Application(_))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpCode::Hello => write!(f, "Hello"),
            OpCode::Welcome => write!(f, "Welcome"),
            OpCode::Ping => write!(f, "Ping"),
            OpCode::Pong => write!(f, "Pong"),
            OpCode::Application(raw) => write!(f, "Application(0x{raw:02x})"),
        }
    }
}
