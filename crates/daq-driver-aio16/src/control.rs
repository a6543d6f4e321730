//! Control-plane dispatch.
//!
//! The board is configured and monitored through a small request/response
//! surface, typed here as enums rather than raw command numbers.

use crate::board::{Aio16Board, BoardStatus};
use crate::config::ChannelTable;
use crate::error::Result;
use crate::registers::RegisterBus;

/// Data ports exposed per board (port 0 is the analog input stream).
pub const NUM_PORTS: u32 = 1;

/// A control-plane request.
#[derive(Debug, Clone)]
pub enum ControlRequest {
    /// How many data ports the board exposes.
    GetPortCount,
    /// Validate and store a channel table.
    Configure(ChannelTable),
    /// Read status word and counters.
    GetStatus,
    /// Begin acquisition.
    Start,
    /// End acquisition.
    Stop,
}

/// Reply to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum ControlResponse {
    /// Number of data ports.
    PortCount(u32),
    /// Configuration accepted.
    Configured,
    /// Current board status.
    Status(BoardStatus),
    /// Acquisition running.
    Started,
    /// Acquisition stopped.
    Stopped,
}

/// Dispatch one control request against a board.
pub fn dispatch<B: RegisterBus>(
    board: &Aio16Board<B>,
    request: ControlRequest,
) -> Result<ControlResponse> {
    match request {
        ControlRequest::GetPortCount => Ok(ControlResponse::PortCount(NUM_PORTS)),
        ControlRequest::Configure(table) => {
            board.configure(&table)?;
            Ok(ControlResponse::Configured)
        }
        ControlRequest::GetStatus => Ok(ControlResponse::Status(board.status())),
        ControlRequest::Start => {
            board.start()?;
            Ok(ControlResponse::Started)
        }
        ControlRequest::Stop => {
            board.stop();
            Ok(ControlResponse::Stopped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Aio16Board;
    use crate::error::Aio16Error;
    use crate::mock::{ManualClock, MemorySink, MockBus};
    use crate::registers::StatusReg;

    fn board() -> Aio16Board<MockBus> {
        let bus = MockBus::new();
        bus.set_status(StatusReg::BIPOLAR.bits());
        Aio16Board::new(bus, ManualClock::new(0), MemorySink::factory().0)
    }

    fn table() -> ChannelTable {
        let mut table = ChannelTable::default();
        table.set_channel(0, 100, 2, true);
        table.set_channel(1, 100, 2, true);
        table
    }

    #[test]
    fn reports_one_port() {
        assert_eq!(
            dispatch(&board(), ControlRequest::GetPortCount).unwrap(),
            ControlResponse::PortCount(1)
        );
    }

    #[test]
    fn full_control_cycle() {
        let board = board();
        dispatch(&board, ControlRequest::Configure(table())).unwrap();
        dispatch(&board, ControlRequest::Start).unwrap();

        match dispatch(&board, ControlRequest::GetStatus).unwrap() {
            ControlResponse::Status(status) => assert!(status.busy),
            other => panic!("unexpected response {other:?}"),
        }

        // configure while running is refused
        let err = dispatch(&board, ControlRequest::Configure(table())).unwrap_err();
        assert!(matches!(err, Aio16Error::Busy));

        dispatch(&board, ControlRequest::Stop).unwrap();
        match dispatch(&board, ControlRequest::GetStatus).unwrap() {
            ControlResponse::Status(status) => assert!(!status.busy),
            other => panic!("unexpected response {other:?}"),
        }
    }
}
