pub mod chat;
pub mod connection;
pub mod dispatcher;
pub mod notify;

use std::sync::Arc;

use quad_db::Database;

use crate::dispatcher::Dispatcher;
use crate::notify::Notifier;

/// Everything a live gateway connection needs. Constructed once at server
/// start and cloned per connection; the dispatcher and notifier are shared
/// handles, never globals.
#[derive(Clone)]
pub struct GatewayState {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub notifier: Notifier,
    pub jwt_secret: String,
}
