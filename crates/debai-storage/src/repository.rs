//! SQLite-backed employee directory.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use debai_core::error::DebaiError;
use debai_core::types::{Employee, EmployeeField, EmployeeFilter, NewEmployee};

use crate::db::Database;

const SELECT_COLUMNS: &str = "SELECT id, name, role, email, phone, created_at FROM employees";

/// Repository for employee records.
pub struct EmployeeRepository {
    db: Arc<Database>,
}

impl EmployeeRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new employee.
    ///
    /// Fails with [`DebaiError::Duplicate`] when an employee with the same
    /// name (case-insensitive) already exists with the same email or role.
    pub fn add(&self, new: &NewEmployee) -> Result<Employee, DebaiError> {
        self.db.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM employees
                     WHERE lower(name) = lower(?1)
                       AND (lower(email) = lower(?2) OR lower(role) = lower(?3))
                     LIMIT 1",
                    rusqlite::params![new.name, new.email, new.role],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| DebaiError::Storage(e.to_string()))?;

            if existing.is_some() {
                return Err(DebaiError::Duplicate(format!(
                    "employee '{}' already exists",
                    new.name
                )));
            }

            let employee = Employee {
                id: Uuid::new_v4(),
                name: new.name.clone(),
                role: new.role.clone(),
                email: new.email.clone(),
                phone: new.phone.clone(),
                created_at: Utc::now(),
            };

            conn.execute(
                "INSERT INTO employees (id, name, role, email, phone, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    employee.id.to_string(),
                    employee.name,
                    employee.role,
                    employee.email,
                    employee.phone,
                    employee.created_at.timestamp(),
                ],
            )
            .map_err(|e| DebaiError::Storage(format!("Failed to save employee: {}", e)))?;

            Ok(employee)
        })
    }

    /// Find employees matching the filter, in insertion order.
    ///
    /// A plural role filter ("developers") also matches the singular form.
    pub fn query(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>, DebaiError> {
        let name = filter.name.as_deref().map(str::to_lowercase);
        let role = filter.role.as_deref().map(str::to_lowercase);
        let role_stem = role.as_deref().map(singular);

        self.db.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR instr(lower(name), ?1) > 0)
                   AND (?2 IS NULL OR instr(lower(role), ?2) > 0 OR instr(lower(role), ?3) > 0)
                 ORDER BY rowid",
                SELECT_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DebaiError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![name, role, role_stem], |row| {
                    Ok(row_to_employee(row))
                })
                .map_err(|e| DebaiError::Storage(e.to_string()))?;

            let mut employees = Vec::new();
            for row in rows {
                employees.push(row.map_err(|e| DebaiError::Storage(e.to_string()))??);
            }
            Ok(employees)
        })
    }

    /// Set `field` to `value` on every employee whose name equals `name`,
    /// ignoring case. Returns the updated records.
    ///
    /// Fails with [`DebaiError::NotFound`] when no employee has that name.
    pub fn update(
        &self,
        name: &str,
        field: EmployeeField,
        value: &str,
    ) -> Result<Vec<Employee>, DebaiError> {
        let name = name.trim();
        self.db.with_conn(|conn| {
            let sql = format!(
                "UPDATE employees SET {} = ?1 WHERE lower(name) = lower(?2)",
                column(field)
            );
            let changed = conn
                .execute(&sql, rusqlite::params![value, name])
                .map_err(|e| DebaiError::Storage(format!("Failed to update employee: {}", e)))?;
            if changed == 0 {
                return Err(DebaiError::NotFound(name.to_string()));
            }
            by_name(conn, name)
        })
    }

    /// Remove every employee whose name equals `name`, ignoring case.
    /// Returns the removed records.
    ///
    /// Fails with [`DebaiError::NotFound`] when no employee has that name.
    pub fn delete(&self, name: &str) -> Result<Vec<Employee>, DebaiError> {
        let name = name.trim();
        self.db.with_conn(|conn| {
            let removed = by_name(conn, name)?;
            if removed.is_empty() {
                return Err(DebaiError::NotFound(name.to_string()));
            }
            conn.execute(
                "DELETE FROM employees WHERE lower(name) = lower(?1)",
                rusqlite::params![name],
            )
            .map_err(|e| DebaiError::Storage(format!("Failed to delete employee: {}", e)))?;
            Ok(removed)
        })
    }

    /// Find an employee by ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Employee>, DebaiError> {
        self.db.with_conn(|conn| {
            let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
            let result = conn
                .query_row(&sql, rusqlite::params![id.to_string()], |row| {
                    Ok(row_to_employee(row))
                })
                .optional()
                .map_err(|e| DebaiError::Storage(e.to_string()))?;

            result.transpose()
        })
    }

    /// Number of stored employees.
    pub fn count(&self) -> Result<u64, DebaiError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM employees", [], |row| row.get(0))
                .map_err(|e| DebaiError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn column(field: EmployeeField) -> &'static str {
    match field {
        EmployeeField::Email => "email",
        EmployeeField::Phone => "phone",
        EmployeeField::Role => "role",
    }
}

/// Employees whose name equals `name`, ignoring case, in insertion order.
fn by_name(conn: &rusqlite::Connection, name: &str) -> Result<Vec<Employee>, DebaiError> {
    let sql = format!("{} WHERE lower(name) = lower(?1) ORDER BY rowid", SELECT_COLUMNS);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| DebaiError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params![name], |row| Ok(row_to_employee(row)))
        .map_err(|e| DebaiError::Storage(e.to_string()))?;

    let mut employees = Vec::new();
    for row in rows {
        employees.push(row.map_err(|e| DebaiError::Storage(e.to_string()))??);
    }
    Ok(employees)
}

/// Strip a plural `s` from words longer than three characters.
fn singular(role: &str) -> String {
    if role.len() > 3 && role.ends_with('s') && !role.ends_with("ss") {
        role[..role.len() - 1].to_string()
    } else {
        role.to_string()
    }
}

fn row_to_employee(row: &rusqlite::Row<'_>) -> Result<Employee, DebaiError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| DebaiError::Storage(e.to_string()))?;
    let created_at: i64 = row
        .get(5)
        .map_err(|e| DebaiError::Storage(e.to_string()))?;

    Ok(Employee {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DebaiError::Storage(format!("Invalid UUID: {}", e)))?,
        name: row.get(1).map_err(|e| DebaiError::Storage(e.to_string()))?,
        role: row.get(2).map_err(|e| DebaiError::Storage(e.to_string()))?,
        email: row.get(3).map_err(|e| DebaiError::Storage(e.to_string()))?,
        phone: row.get(4).map_err(|e| DebaiError::Storage(e.to_string()))?,
        created_at: Utc
            .timestamp_opt(created_at, 0)
            .single()
            .ok_or_else(|| DebaiError::Storage(format!("Invalid timestamp: {}", created_at)))?,
    })
}
