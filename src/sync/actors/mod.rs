//! Widget and CRM actors and the loop that drives them.

pub mod context;
pub mod crm;
pub mod poller;
pub mod widget;

pub use context::ActorContext;
pub use crm::{CrmActor, CrmConversationView};
pub use poller::{BusyFlag, BusyGuard, Poller, Reconcile, TickFuture, TickOutcome, TickReport};
pub use widget::{SendOutcome, WidgetActor, WidgetSnapshot};
