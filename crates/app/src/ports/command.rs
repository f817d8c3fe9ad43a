//! Command port: where the correlation engine sends its decisions.

use std::future::Future;

use thiefwatch_domain::decision::Command;
use thiefwatch_domain::error::WatchError;
use thiefwatch_domain::location::Location;

/// Carries out a lighting command for a location.
pub trait CommandSink: Send + Sync {
    fn send(
        &self,
        location: &Location,
        command: Command,
    ) -> impl Future<Output = Result<(), WatchError>> + Send;
}

impl<T: CommandSink> CommandSink for std::sync::Arc<T> {
    fn send(
        &self,
        location: &Location,
        command: Command,
    ) -> impl Future<Output = Result<(), WatchError>> + Send {
        (**self).send(location, command)
    }
}
