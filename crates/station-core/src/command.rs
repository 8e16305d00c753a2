//! Routing of remote method calls to the station.

use crate::id::NodeId;
use crate::node::{Argument, CommandKind, NodeBody};
use crate::state::StationError;
use crate::station::Station;
use crate::value::{DataType, Variant};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("expected {expected} input arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("argument {index}: expected {expected}, got {actual}")]
    ArgumentType {
        index: usize,
        expected: DataType,
        actual: DataType,
    },
    #[error(transparent)]
    Station(#[from] StationError),
    #[error("command {0:?} is not handled by the station")]
    Unsupported(CommandKind),
    #[error("method not found: {0}")]
    MethodNotFound(NodeId),
    #[error("node {0} is not a method")]
    NotAMethod(NodeId),
    #[error("method {0} has no behavior bound")]
    Unbound(NodeId),
}

/// Check `args` against the declared input arguments.
pub fn validate_arguments(expected: &[Argument], args: &[Variant]) -> Result<(), CallError> {
    if expected.len() != args.len() {
        return Err(CallError::ArgumentCount {
            expected: expected.len(),
            actual: args.len(),
        });
    }
    for (index, (declared, arg)) in expected.iter().zip(args).enumerate() {
        if declared.data_type != arg.data_type() {
            return Err(CallError::ArgumentType {
                index,
                expected: declared.data_type,
                actual: arg.data_type(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    station: Arc<Station>,
}

impl CommandDispatcher {
    pub fn new(station: Arc<Station>) -> Self {
        Self { station }
    }

    pub fn station(&self) -> &Arc<Station> {
        &self.station
    }

    /// Resolve the method node `method` to its bound command.
    pub fn resolve(&self, method: &NodeId) -> Result<CommandKind, CallError> {
        let node = self
            .station
            .space()
            .find(method)
            .ok_or_else(|| CallError::MethodNotFound(method.clone()))?;
        match &node.body {
            NodeBody::Method(body) => body
                .binding
                .ok_or_else(|| CallError::Unbound(method.clone())),
            _ => Err(CallError::NotAMethod(method.clone())),
        }
    }

    /// Validate `args` and run `command`. Successful station commands have
    /// no output arguments.
    pub fn call(&self, command: CommandKind, args: &[Variant]) -> Result<Vec<Variant>, CallError> {
        validate_arguments(&command.input_arguments(), args)?;
        match command {
            CommandKind::Execute => {
                let serial = args.first().and_then(Variant::as_u64).unwrap_or_default();
                self.station.execute(serial)?;
            }
            CommandKind::Reset => self.station.reset(),
            CommandKind::OpenPressureReleaseValve => self.station.open_pressure_release_valve(),
            CommandKind::GenerateAas => return Err(CallError::Unsupported(command)),
        }
        Ok(Vec::new())
    }

    pub fn call_node(&self, method: &NodeId, args: &[Variant]) -> Result<Vec<Variant>, CallError> {
        let command = self.resolve(method)?;
        self.call(command, args)
    }
}
