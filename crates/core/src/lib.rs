pub mod aliases;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod intake;
pub mod review;

pub use aliases::{AliasRule, AliasTable};
pub use catalog::{Catalog, CatalogLookup};
pub use domain::order::{
    round_money, BalanceCheck, Confidence, ItemStub, OrderDraft, OrderId, OrderStatus, OrderType,
    PaymentMethod, WALK_IN_CUSTOMER,
};
pub use domain::product::{ProductCatalogEntry, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use intake::{IntakePipeline, ParseOutcome, ParseReport, SkipReason, SkippedLine};
pub use review::{
    CommitFailure, CommitReport, CommittedOrder, HeaderEdit, ItemEdit, OrderSink, ReviewError,
    ReviewSession, SessionState,
};
