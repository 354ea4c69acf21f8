//! Employee directory collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use debai_core::types::{Employee, EmployeeField, EmployeeFilter, EmployeeUpdate, NewEmployee};
use debai_storage::EmployeeRepository;

use crate::error::CollaboratorError;
use crate::types::ActionDetail;

#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// Store a new employee. Fails with `Duplicate` when the same person
    /// is already present.
    async fn add(&self, employee: &NewEmployee) -> Result<Employee, CollaboratorError>;

    async fn query(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>, CollaboratorError>;

    /// Change one field on the employees named `name` (case-insensitive,
    /// whole name). Fails with `NotFound` when nobody has that name.
    async fn update(
        &self,
        name: &str,
        field: EmployeeField,
        value: &str,
    ) -> Result<Vec<Employee>, CollaboratorError>;

    /// Remove the employees named `name`. Fails with `NotFound` when
    /// nobody has that name.
    async fn delete(&self, name: &str) -> Result<Vec<Employee>, CollaboratorError>;
}

/// Directory backed by the SQLite employee table.
pub struct SqliteDirectory {
    repo: Arc<EmployeeRepository>,
}

impl SqliteDirectory {
    pub fn new(repo: Arc<EmployeeRepository>) -> Self {
        Self { repo }
    }
}

fn join_error(err: tokio::task::JoinError) -> CollaboratorError {
    CollaboratorError::Unavailable(format!("directory task failed: {}", err))
}

#[async_trait]
impl EmployeeDirectory for SqliteDirectory {
    async fn add(&self, employee: &NewEmployee) -> Result<Employee, CollaboratorError> {
        let repo = Arc::clone(&self.repo);
        let employee = employee.clone();
        let stored = tokio::task::spawn_blocking(move || repo.add(&employee))
            .await
            .map_err(join_error)??;
        Ok(stored)
    }

    async fn query(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>, CollaboratorError> {
        let repo = Arc::clone(&self.repo);
        let filter = filter.clone();
        let employees = tokio::task::spawn_blocking(move || repo.query(&filter))
            .await
            .map_err(join_error)??;
        Ok(employees)
    }

    async fn update(
        &self,
        name: &str,
        field: EmployeeField,
        value: &str,
    ) -> Result<Vec<Employee>, CollaboratorError> {
        let repo = Arc::clone(&self.repo);
        let (name, value) = (name.to_string(), value.to_string());
        let updated = tokio::task::spawn_blocking(move || repo.update(&name, field, &value))
            .await
            .map_err(join_error)??;
        Ok(updated)
    }

    async fn delete(&self, name: &str) -> Result<Vec<Employee>, CollaboratorError> {
        let repo = Arc::clone(&self.repo);
        let name = name.to_string();
        let removed = tokio::task::spawn_blocking(move || repo.delete(&name))
            .await
            .map_err(join_error)??;
        Ok(removed)
    }
}

/// Add one employee.
pub async fn add_employee(
    directory: &dyn EmployeeDirectory,
    employee: &NewEmployee,
) -> Result<ActionDetail, CollaboratorError> {
    let employee = directory.add(employee).await?;
    info!(id = %employee.id, name = %employee.name, role = %employee.role, "Employee added");
    Ok(ActionDetail::EmployeeAdded { employee })
}

/// Change one field of an existing employee.
pub async fn update_employee(
    directory: &dyn EmployeeDirectory,
    update: &EmployeeUpdate,
) -> Result<ActionDetail, CollaboratorError> {
    let employees = directory
        .update(&update.name, update.field, &update.value)
        .await?;
    info!(name = %update.name, field = %update.field, count = employees.len(), "Employee updated");
    Ok(ActionDetail::EmployeeUpdated {
        field: update.field,
        value: update.value.clone(),
        employees,
    })
}

/// Remove an employee by name.
pub async fn delete_employee(
    directory: &dyn EmployeeDirectory,
    name: &str,
) -> Result<ActionDetail, CollaboratorError> {
    let employees = directory.delete(name).await?;
    info!(name = %name, count = employees.len(), "Employee deleted");
    Ok(ActionDetail::EmployeeDeleted {
        name: name.to_string(),
        employees,
    })
}

/// List employees matching `filter`. An empty result is not an error.
pub async fn list_employees(
    directory: &dyn EmployeeDirectory,
    filter: &EmployeeFilter,
) -> Result<ActionDetail, CollaboratorError> {
    let employees = directory.query(filter).await?;
    info!(count = employees.len(), role = ?filter.role, name = ?filter.name, "Employees listed");
    Ok(ActionDetail::EmployeeList {
        filter: filter.clone(),
        employees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use debai_storage::Database;

    fn directory() -> SqliteDirectory {
        let db = Arc::new(Database::in_memory().unwrap());
        SqliteDirectory::new(Arc::new(EmployeeRepository::new(db)))
    }

    fn rahul() -> NewEmployee {
        NewEmployee {
            name: "Rahul Saha".to_string(),
            role: "backend developer".to_string(),
            email: "rahul@gmail.com".to_string(),
            phone: "8394847563".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let dir = directory();
        let detail = add_employee(&dir, &rahul()).await.unwrap();
        let added = match detail {
            ActionDetail::EmployeeAdded { employee } => employee,
            other => panic!("unexpected detail: {:?}", other),
        };
        assert_eq!(added.name, "Rahul Saha");

        let detail = list_employees(&dir, &EmployeeFilter::by_role("backend developers"))
            .await
            .unwrap();
        match detail {
            ActionDetail::EmployeeList { employees, .. } => {
                assert_eq!(employees, vec![added]);
            }
            other => panic!("unexpected detail: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_maps_to_collaborator_duplicate() {
        let dir = directory();
        dir.add(&rahul()).await.unwrap();
        let err = dir.add(&rahul()).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Duplicate(_)));
        assert!(!err.is_infrastructure());
    }

    #[tokio::test]
    async fn test_update_then_list() {
        let dir = directory();
        dir.add(&rahul()).await.unwrap();
        let update = EmployeeUpdate {
            name: "rahul saha".to_string(),
            field: EmployeeField::Role,
            value: "tech lead".to_string(),
        };
        let detail = update_employee(&dir, &update).await.unwrap();
        match detail {
            ActionDetail::EmployeeUpdated { field, value, employees } => {
                assert_eq!(field, EmployeeField::Role);
                assert_eq!(value, "tech lead");
                assert_eq!(employees.len(), 1);
                assert_eq!(employees[0].role, "tech lead");
            }
            other => panic!("unexpected detail: {:?}", other),
        }
        let leads = dir.query(&EmployeeFilter::by_role("tech lead")).await.unwrap();
        assert_eq!(leads.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_name_is_not_found() {
        let dir = directory();
        let update = EmployeeUpdate {
            name: "Nobody".to_string(),
            field: EmployeeField::Phone,
            value: "12345".to_string(),
        };
        let err = update_employee(&dir, &update).await.unwrap_err();
        assert_eq!(err, CollaboratorError::NotFound("Nobody".to_string()));
    }

    #[tokio::test]
    async fn test_delete_removes_employee() {
        let dir = directory();
        dir.add(&rahul()).await.unwrap();
        let detail = delete_employee(&dir, "Rahul Saha").await.unwrap();
        assert!(matches!(detail, ActionDetail::EmployeeDeleted { ref employees, .. } if employees.len() == 1));
        assert!(dir.query(&EmployeeFilter::default()).await.unwrap().is_empty());

        let err = delete_employee(&dir, "Rahul Saha").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_list_is_ok() {
        let dir = directory();
        let detail = list_employees(&dir, &EmployeeFilter::by_role("astronaut"))
            .await
            .unwrap();
        assert_eq!(
            detail,
            ActionDetail::EmployeeList {
                filter: EmployeeFilter::by_role("astronaut"),
                employees: vec![],
            }
        );
    }
}
