//! Transaction stages: request model, fees, context, post and poll

pub mod gas;
pub mod helper;
pub mod poll;
pub mod request;
pub mod sender;

pub use gas::FeeBuilder;
pub use helper::TxContext;
pub use poll::{TxPoller, TxQuery};
pub use request::{cw20_send, Coin, Fee, Msg, TransactionRequest};
pub use sender::{BroadcastResult, Broadcaster, TxPoster};
