use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::call_stack::CallStackCache;
use crate::dispatcher::RequestDispatcher;
use crate::errors::SessionError;
use crate::requests::{Command, ScopesArguments, VariablesArguments};
use crate::responses::{ScopesResponse, VariablesResponse};
use crate::types::{Scope, Variable};

/// Fetches the local variables of stack frames, at most once per frame and stop.
#[derive(Debug, Default)]
pub struct VariableResolver {
    cache: HashMap<i64, Vec<Variable>>,
}

impl VariableResolver {
    pub async fn fetch(
        &mut self,
        frame_id: i64,
        dispatcher: &Arc<RequestDispatcher>,
        call_stack: &CallStackCache,
    ) -> Result<Vec<Variable>, SessionError> {
        if !call_stack.contains(frame_id) {
            return Err(SessionError::UnknownFrameError { frame_id });
        }
        if let Some(variables) = self.cache.get(&frame_id) {
            return Ok(variables.clone());
        }

        let scopes: ScopesResponse = dispatcher
            .request(Command::Scopes(ScopesArguments { frame_id }))
            .await?;
        let Some(scope) = locals_scope(&scopes.scopes) else {
            trace!("Frame {frame_id} has no scopes.");
            self.cache.insert(frame_id, vec![]);
            return Ok(vec![]);
        };
        let variables: VariablesResponse = dispatcher
            .request(Command::Variables(VariablesArguments {
                variables_reference: scope.variables_reference,
            }))
            .await?;

        self.cache.insert(frame_id, variables.variables.clone());
        Ok(variables.variables)
    }

    pub fn cached(&self, frame_id: i64) -> Option<&[Variable]> {
        self.cache.get(&frame_id).map(Vec::as_slice)
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }
}

/// The scope named `Locals` or `Local`, else the first one.
fn locals_scope(scopes: &[Scope]) -> Option<&Scope> {
    scopes
        .iter()
        .find(|scope| scope.holds_locals())
        .or_else(|| scopes.first())
}
