pub mod context;
pub mod formatter;
pub mod loaders;
pub mod mock_schema;
pub mod mocks;
pub mod resolvers;
pub mod schema;
pub mod server;

pub use context::{ContextFactory, RequestContext};
pub use formatter::ErrorFormatter;
pub use server::GraphQLServer;
