/// Error set shared by the whole engine and by host drivers.
///
/// Each variant corresponds to one failure class of the command,
/// transfer and identification paths; drivers map their hardware
/// status bits onto these before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdmmcError {
    /// No card present, card unusable, or card removed mid-operation.
    NoCard,
    /// Operation, command or card class not supported.
    NotSupported,
    /// CRC error on a command response or on the data phase.
    BadMessage,
    /// Response or data timeout.
    Timeout,
    /// Card-reported error bits set in the Card Status word.
    CardFault,
    /// FIFO underrun/overrun or buffer exhaustion.
    NoMemory,
    /// Malformed parameters, e.g. a block size that is not 32-bit aligned.
    InvalidArg,
    /// Card stayed busy past the bounded wait.
    Busy,
    /// Unclassified transport error.
    Io,
}

pub type SdmmcResult<T = ()> = Result<T, SdmmcError>;
