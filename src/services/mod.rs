pub mod payments;
pub mod products;

pub use payments::{PaymentRequest, PaymentService};
pub use products::{NewProduct, ProductChanges, ProductService};
