//! Boundary normalization for duck-typed backend responses.
//!
//! The organisational endpoints return their list payload as either
//! `{"departments": [...]}` or `{"items": [...]}` depending on backend
//! version. The shape is resolved here, once, so no call site branches on it.

use crate::types::Department;

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum DepartmentListShape {
    Departments { departments: Vec<Department> },
    Items { items: Vec<Department> },
    Bare(Vec<Department>),
}

/// Decodes a department list from any of the shapes the backend emits.
pub fn departments_from_json(value: serde_json::Value) -> Result<Vec<Department>, serde_json::Error> {
    let shape: DepartmentListShape = serde_json::from_value(value)?;
    Ok(match shape {
        DepartmentListShape::Departments { departments } => departments,
        DepartmentListShape::Items { items } => items,
        DepartmentListShape::Bare(list) => list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histology_json() -> serde_json::Value {
        serde_json::json!({
            "id": "d1",
            "code": "D1",
            "name": "Histology",
            "rooms": [{"id": "r1", "code": "R1", "name": "Histology Room 1"}]
        })
    }

    #[test]
    fn test_departments_shape() {
        let value = serde_json::json!({ "departments": [histology_json()] });
        let departments = departments_from_json(value).unwrap();
        assert_eq!(departments.len(), 1);
        assert_eq!(departments[0].name, "Histology");
        assert_eq!(departments[0].rooms[0].id.as_str(), "r1");
    }

    #[test]
    fn test_items_shape() {
        let value = serde_json::json!({ "items": [histology_json()] });
        let departments = departments_from_json(value).unwrap();
        assert_eq!(departments.len(), 1);
        assert_eq!(departments[0].code, "D1");
    }

    #[test]
    fn test_bare_list_shape() {
        let value = serde_json::json!([histology_json()]);
        let departments = departments_from_json(value).unwrap();
        assert_eq!(departments.len(), 1);
    }

    #[test]
    fn test_unknown_shape_is_an_error() {
        let value = serde_json::json!({ "records": [] });
        assert!(departments_from_json(value).is_err());
    }
}
