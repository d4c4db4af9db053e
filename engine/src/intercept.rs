//! Explicit call-site interception.
//!
//! A host program wraps the operations it has linked to ontology entities.
//! [`DeclaredMethod`] emits one relation check per binding after each call;
//! [`DeclaredClass`] creates an ontology individual for each constructed
//! instance and emits one constraint check per bound data property.

use std::cell::RefCell;
use std::collections::HashSet;

use relcheck_ontology::names::local_name;
use relcheck_ontology::IndividualValue;

use crate::engine::{Submission, VerificationEngine};
use crate::error::Result;
use crate::request::{CallSite, ConstraintCheck, RelationCheck, VerificationRequest};

/// The ontology individual a script object is linked to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Linked {
    /// Individual identifier, e.g. `onto.person1`.
    pub individual: String,
    /// Class of the individual, e.g. `Person`.
    pub class: String,
}

impl Linked {
    /// Links to `individual` of class `class`.
    pub fn new(individual: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            individual: individual.into(),
            class: class.into(),
        }
    }
}

/// Object property asserted between two arguments of a declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationBinding {
    /// Object property name.
    pub relation: String,
    /// Index of the subject argument.
    pub subject_arg: usize,
    /// Index of the object argument.
    pub object_arg: usize,
}

thread_local! {
    static ACTIVE: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Removes a method from the active set on drop, also when the call unwinds.
struct ActiveGuard {
    name: String,
    outermost: bool,
}

impl ActiveGuard {
    fn enter(name: &str) -> Self {
        let outermost = ACTIVE.with(|active| active.borrow_mut().insert(name.to_string()));
        Self {
            name: name.to_string(),
            outermost,
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.outermost {
            ACTIVE.with(|active| active.borrow_mut().remove(&self.name));
        }
    }
}

/// A method whose calls assert object properties between its arguments.
#[derive(Debug, Clone)]
pub struct DeclaredMethod {
    name: String,
    bindings: Vec<RelationBinding>,
}

impl DeclaredMethod {
    /// Declares a method with no bindings yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    /// Adds a relation between two argument positions.
    #[must_use]
    pub fn bind(mut self, relation: impl Into<String>, subject_arg: usize, object_arg: usize) -> Self {
        self.bindings.push(RelationBinding {
            relation: relation.into(),
            subject_arg,
            object_arg,
        });
        self
    }

    /// Method name used for recursion detection.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `body`, then submits one relation check per binding.
    ///
    /// Calls made from inside another call of the same method on this thread
    /// are recursive and submit nothing. Bindings whose argument index is out
    /// of range are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first submission error; `body` has already run by then.
    pub fn call<R>(
        &self,
        engine: &VerificationEngine,
        args: &[&Linked],
        call_site: CallSite,
        body: impl FnOnce() -> R,
    ) -> Result<(R, Vec<Submission>)> {
        let guard = ActiveGuard::enter(&self.name);
        let value = body();
        if !guard.outermost {
            return Ok((value, Vec::new()));
        }
        let mut submissions = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let (Some(subject), Some(object)) =
                (args.get(binding.subject_arg), args.get(binding.object_arg))
            else {
                continue;
            };
            let request = VerificationRequest::Relation(RelationCheck {
                subject: subject.individual.clone(),
                relation: binding.relation.clone(),
                object: object.individual.clone(),
                subject_type: subject.class.clone(),
                object_type: object.class.clone(),
                call_site: call_site.clone(),
            });
            submissions.push(engine.submit(request)?);
        }
        Ok((value, submissions))
    }
}

/// Data property bound to an instance variable of a declared class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintBinding {
    /// Data property carrying the constraint.
    pub constraint: String,
    /// Instance variable holding the value.
    pub variable: String,
}

/// Instance variables a declared class exposes to constraint checks.
pub trait DataValues {
    /// Current value of `variable`, if the instance has one.
    fn value_of(&self, variable: &str) -> Option<IndividualValue>;
}

/// A constructed instance together with its ontology individual.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance<T> {
    /// The script-level value.
    pub value: T,
    /// The individual created for it.
    pub linked: Linked,
}

/// A class whose instances are individuals of an ontology class.
#[derive(Debug)]
pub struct DeclaredClass {
    class: String,
    prefix: String,
    bindings: Vec<ConstraintBinding>,
    namer: parking_lot::Mutex<u64>,
}

impl DeclaredClass {
    /// Declares a class linked to ontology class `class`; individuals are
    /// named `<prefix>.<class-lowercase><n>`.
    pub fn new(class: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            prefix: prefix.into(),
            bindings: Vec::new(),
            namer: parking_lot::Mutex::new(0),
        }
    }

    /// Binds a data property to an instance variable.
    #[must_use]
    pub fn bind(mut self, constraint: impl Into<String>, variable: impl Into<String>) -> Self {
        self.bindings.push(ConstraintBinding {
            constraint: constraint.into(),
            variable: variable.into(),
        });
        self
    }

    fn next_individual(&self) -> Linked {
        let mut n = self.namer.lock();
        *n += 1;
        let stem = local_name(&self.class).to_lowercase();
        Linked::new(format!("{}.{stem}{}", self.prefix, *n), self.class.clone())
    }

    /// Runs `construct`, links the result to a fresh individual and submits
    /// one constraint check per bound variable that has a value.
    ///
    /// # Errors
    ///
    /// Returns the first submission error.
    pub fn construct<T: DataValues>(
        &self,
        engine: &VerificationEngine,
        call_site: CallSite,
        construct: impl FnOnce() -> T,
    ) -> Result<(Instance<T>, Vec<Submission>)> {
        let value = construct();
        let linked = self.next_individual();
        let mut submissions = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let Some(tested) = value.value_of(&binding.variable) else {
                continue;
            };
            let request = VerificationRequest::Constraint(ConstraintCheck {
                constraint: binding.constraint.clone(),
                variable: binding.variable.clone(),
                value: tested,
                individual_type: self.class.clone(),
                instance: linked.individual.clone(),
                call_site: call_site.clone(),
            });
            submissions.push(engine.submit(request)?);
        }
        Ok((Instance { value, linked }, submissions))
    }
}
