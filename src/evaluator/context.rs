// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Evaluation contexts
//!
//! [`ElContext`] is the ambient context supplied by the caller: the resolver
//! chain, optional function and variable mappers, the member resolver and the
//! evaluation listeners. [`EvaluationContext`] wraps it for the duration of
//! one evaluation together with the bindings the expression captured.

use super::functions::{ElFunction, FunctionBindings, FunctionMapper};
use super::resolver::ElResolver;
use super::variables::{VariableBindings, VariableMapper};
use crate::expression::ValueExpression;
use crate::registry::MemberResolver;
use std::fmt;
use std::sync::Arc;

/// Observer notified around every expression evaluation
pub trait EvaluationListener: Send + Sync {
    /// Called before an expression is evaluated
    fn before_evaluation(&self, _expression: &str) {}

    /// Called after an expression was evaluated, whether it failed or not
    fn after_evaluation(&self, _expression: &str) {}
}

/// Ambient context of expression construction and evaluation
#[derive(Clone)]
pub struct ElContext {
    resolver: Arc<dyn ElResolver>,
    function_mapper: Option<Arc<dyn FunctionMapper>>,
    variable_mapper: Option<Arc<dyn VariableMapper>>,
    member_resolver: Arc<MemberResolver>,
    listeners: Vec<Arc<dyn EvaluationListener>>,
}

impl ElContext {
    /// Create a context around a resolver chain
    pub fn new(resolver: Arc<dyn ElResolver>) -> Self {
        Self {
            resolver,
            function_mapper: None,
            variable_mapper: None,
            member_resolver: Arc::new(MemberResolver::new()),
            listeners: Vec::new(),
        }
    }

    /// Use `mapper` to resolve functions when building expressions
    pub fn with_function_mapper(mut self, mapper: Arc<dyn FunctionMapper>) -> Self {
        self.function_mapper = Some(mapper);
        self
    }

    /// Use `mapper` to resolve variables when building expressions
    pub fn with_variable_mapper(mut self, mapper: Arc<dyn VariableMapper>) -> Self {
        self.variable_mapper = Some(mapper);
        self
    }

    /// Share a member resolver (and its candidate cache)
    pub fn with_member_resolver(mut self, resolver: Arc<MemberResolver>) -> Self {
        self.member_resolver = resolver;
        self
    }

    /// Add an evaluation listener
    pub fn with_listener(mut self, listener: Arc<dyn EvaluationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Add an evaluation listener in place
    pub fn add_listener(&mut self, listener: Arc<dyn EvaluationListener>) {
        self.listeners.push(listener);
    }

    /// The resolver chain
    pub fn resolver(&self) -> &dyn ElResolver {
        self.resolver.as_ref()
    }

    /// The function mapper, if any
    pub fn function_mapper(&self) -> Option<&dyn FunctionMapper> {
        self.function_mapper.as_deref()
    }

    /// The variable mapper, if any
    pub fn variable_mapper(&self) -> Option<&dyn VariableMapper> {
        self.variable_mapper.as_deref()
    }

    /// The member resolver
    pub fn member_resolver(&self) -> &MemberResolver {
        &self.member_resolver
    }

    /// Notify every listener that `expression` is about to be evaluated
    pub fn notify_before_evaluation(&self, expression: &str) {
        for listener in &self.listeners {
            listener.before_evaluation(expression);
        }
    }

    /// Notify every listener that `expression` was evaluated
    pub fn notify_after_evaluation(&self, expression: &str) {
        for listener in &self.listeners {
            listener.after_evaluation(expression);
        }
    }

    /// Notify "before" now and "after" when the returned guard drops
    pub fn evaluation_scope<'a>(&'a self, expression: &'a str) -> EvaluationScope<'a> {
        self.notify_before_evaluation(expression);
        EvaluationScope {
            context: self,
            expression,
        }
    }
}

impl fmt::Debug for ElContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElContext")
            .field("function_mapper", &self.function_mapper.is_some())
            .field("variable_mapper", &self.variable_mapper.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Guard sending the "after evaluation" notification on every exit path
#[must_use = "dropping the scope immediately sends the after-evaluation notification"]
pub struct EvaluationScope<'a> {
    context: &'a ElContext,
    expression: &'a str,
}

impl Drop for EvaluationScope<'_> {
    fn drop(&mut self) {
        self.context.notify_after_evaluation(self.expression);
    }
}

/// Context of one evaluation: the ambient context plus the bindings captured
/// by the expression being evaluated
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    context: &'a ElContext,
    functions: &'a FunctionBindings,
    variables: &'a VariableBindings,
}

impl<'a> EvaluationContext<'a> {
    /// Wrap `context` with captured bindings
    pub fn new(
        context: &'a ElContext,
        functions: &'a FunctionBindings,
        variables: &'a VariableBindings,
    ) -> Self {
        Self {
            context,
            functions,
            variables,
        }
    }

    /// The ambient context
    pub fn el_context(&self) -> &'a ElContext {
        self.context
    }

    /// The resolver chain
    pub fn resolver(&self) -> &'a dyn ElResolver {
        self.context.resolver()
    }

    /// The member resolver
    pub fn member_resolver(&self) -> &'a MemberResolver {
        self.context.member_resolver()
    }

    /// Captured function for a call site
    pub fn function(&self, prefix: &str, local_name: &str) -> Option<&'a ElFunction> {
        self.functions.get(prefix, local_name)
    }

    /// Captured variable
    pub fn variable(&self, name: &str) -> Option<&'a ValueExpression> {
        self.variables.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::resolver::VariableResolver;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl EvaluationListener for Recorder {
        fn before_evaluation(&self, expression: &str) {
            self.events.lock().push(format!("before {expression}"));
        }

        fn after_evaluation(&self, expression: &str) {
            self.events.lock().push(format!("after {expression}"));
        }
    }

    #[test]
    fn test_scope_notifies_on_drop() {
        let recorder = Arc::new(Recorder::default());
        let context = ElContext::new(Arc::new(VariableResolver::new()))
            .with_listener(Arc::clone(&recorder) as Arc<dyn EvaluationListener>);

        {
            let _scope = context.evaluation_scope("${a}");
            assert_eq!(*recorder.events.lock(), vec!["before ${a}".to_string()]);
        }
        assert_eq!(
            *recorder.events.lock(),
            vec!["before ${a}".to_string(), "after ${a}".to_string()]
        );
    }

    #[test]
    fn test_scope_notifies_on_early_return() {
        fn fails(context: &ElContext) -> Result<(), ()> {
            let _scope = context.evaluation_scope("x");
            Err(())
        }

        let recorder = Arc::new(Recorder::default());
        let context = ElContext::new(Arc::new(VariableResolver::new()))
            .with_listener(Arc::clone(&recorder) as Arc<dyn EvaluationListener>);
        assert!(fails(&context).is_err());
        assert_eq!(recorder.events.lock().len(), 2);
    }
}
