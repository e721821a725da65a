use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::HtnError;

pub type TaskId = String;
pub type MethodId = String;
pub type OperatorId = String;

/// An abstract goal that decomposes into one of its methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
}

/// One way to decompose a task, gated by an optional precondition hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub id: MethodId,
    pub task: TaskId,
    #[serde(default)]
    pub precondition: Option<String>,
    pub subtasks: Vec<String>,
}

/// A primitive action: translates one-for-one into a queued combat action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub action: String,
    pub target: String,
}

/// A complete HTN domain: tasks, their methods, and the primitive operators
/// methods may decompose into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub tasks: Vec<Task>,
    pub methods: Vec<Method>,
    pub operators: Vec<Operator>,

    #[serde(skip)]
    task_index: HashMap<TaskId, usize>,
    #[serde(skip)]
    method_index: HashMap<MethodId, usize>,
    #[serde(skip)]
    operator_index: HashMap<OperatorId, usize>,
}

impl Domain {
    pub fn new(
        id: String,
        description: String,
        tasks: Vec<Task>,
        methods: Vec<Method>,
        operators: Vec<Operator>,
    ) -> Result<Self, HtnError> {
        let mut domain = Domain {
            id,
            description,
            tasks,
            methods,
            operators,
            task_index: HashMap::new(),
            method_index: HashMap::new(),
            operator_index: HashMap::new(),
        };
        domain.validate()?;
        Ok(domain)
    }

    /// Enforce every invariant in the data model: unique ids within each
    /// list, every method's task id resolves, every subtask id resolves to
    /// a task or operator, and every method has at least one subtask.
    pub fn validate(&mut self) -> Result<(), HtnError> {
        let mut task_index = HashMap::with_capacity(self.tasks.len());
        for (i, task) in self.tasks.iter().enumerate() {
            if task_index.insert(task.id.clone(), i).is_some() {
                return Err(HtnError::DuplicateTask(task.id.clone()));
            }
        }

        let mut operator_index = HashMap::with_capacity(self.operators.len());
        for (i, op) in self.operators.iter().enumerate() {
            if operator_index.insert(op.id.clone(), i).is_some() {
                return Err(HtnError::DuplicateOperator(op.id.clone()));
            }
        }

        let mut method_index = HashMap::with_capacity(self.methods.len());
        for (i, method) in self.methods.iter().enumerate() {
            if method_index.insert(method.id.clone(), i).is_some() {
                return Err(HtnError::DuplicateMethod(method.id.clone()));
            }
            if !task_index.contains_key(&method.task) {
                return Err(HtnError::UnknownTask {
                    method: method.id.clone(),
                    task: method.task.clone(),
                });
            }
            if method.subtasks.is_empty() {
                return Err(HtnError::EmptySubtasks {
                    method: method.id.clone(),
                });
            }
            for subtask in &method.subtasks {
                if !task_index.contains_key(subtask) && !operator_index.contains_key(subtask) {
                    return Err(HtnError::UnknownSubtask {
                        method: method.id.clone(),
                        subtask: subtask.clone(),
                    });
                }
            }
        }

        self.task_index = task_index;
        self.method_index = method_index;
        self.operator_index = operator_index;
        Ok(())
    }

    pub fn operator_by_id(&self, id: &str) -> Option<&Operator> {
        self.operator_index.get(id).map(|&i| &self.operators[i])
    }

    pub fn is_task(&self, id: &str) -> bool {
        self.task_index.contains_key(id)
    }

    pub fn is_operator(&self, id: &str) -> bool {
        self.operator_index.contains_key(id)
    }

    /// Methods belonging to `task_id`, in declaration order.
    pub fn methods_for(&self, task_id: &str) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(move |m| m.task == task_id)
    }

    #[allow(dead_code)]
    fn method_by_id(&self, id: &str) -> Option<&Method> {
        self.method_index.get(id).map(|&i| &self.methods[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(id: &str) -> Operator {
        Operator {
            id: id.to_string(),
            action: "attack".to_string(),
            target: "nearest_enemy".to_string(),
        }
    }

    #[test]
    fn operator_lookup_reflects_registration() {
        let domain = Domain::new(
            "d1".into(),
            String::new(),
            vec![Task { id: "behave".into() }],
            vec![Method {
                id: "m1".into(),
                task: "behave".into(),
                precondition: None,
                subtasks: vec!["atk".into()],
            }],
            vec![op("atk")],
        )
        .unwrap();

        assert!(domain.operator_by_id("atk").is_some());
        assert!(domain.operator_by_id("missing").is_none());
    }

    #[test]
    fn duplicate_task_ids_are_rejected() {
        let err = Domain::new(
            "d1".into(),
            String::new(),
            vec![Task { id: "a".into() }, Task { id: "a".into() }],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, HtnError::DuplicateTask(id) if id == "a"));
    }

    #[test]
    fn method_with_unknown_task_is_rejected() {
        let err = Domain::new(
            "d1".into(),
            String::new(),
            vec![Task { id: "behave".into() }],
            vec![Method {
                id: "m1".into(),
                task: "ghost".into(),
                precondition: None,
                subtasks: vec!["behave".into()],
            }],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, HtnError::UnknownTask { .. }));
    }

    #[test]
    fn method_with_empty_subtasks_is_rejected() {
        let err = Domain::new(
            "d1".into(),
            String::new(),
            vec![Task { id: "behave".into() }],
            vec![Method {
                id: "m1".into(),
                task: "behave".into(),
                precondition: None,
                subtasks: vec![],
            }],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, HtnError::EmptySubtasks { .. }));
    }

    #[test]
    fn method_with_unresolvable_subtask_is_rejected() {
        let err = Domain::new(
            "d1".into(),
            String::new(),
            vec![Task { id: "behave".into() }],
            vec![Method {
                id: "m1".into(),
                task: "behave".into(),
                precondition: None,
                subtasks: vec!["nowhere".into()],
            }],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, HtnError::UnknownSubtask { .. }));
    }
}
