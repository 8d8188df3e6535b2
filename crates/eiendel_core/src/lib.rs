pub mod domain;
pub mod ports;

pub use domain::{
    AuthSession, ExternalProfile, Item, ItemDraft, ItemPatch, PaymentPackage, PaymentStatus,
    PaymentTransaction, User, UserCredentials,
};
pub use ports::{
    CheckoutRequest, CheckoutService, CheckoutSession, CheckoutStatus, DatabaseService,
    IdentityProviderService, PortError, PortResult, WebhookEvent,
};
