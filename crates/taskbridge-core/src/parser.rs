use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::classify::classify;
use crate::executor::RawExecutionResult;
use crate::model::{Entity, EntityKind, Page};
use crate::result::{failure, success, ErrorCode, ErrorRecord, TypedResult};

fn parse_error(reason: impl std::fmt::Display, stdout: &str) -> ErrorRecord {
    ErrorRecord::new(
        ErrorCode::JsonParseError,
        format!("Malformed script output: {}", reason),
    )
    .with_detail(stdout.trim())
}

/// Parses stdout as JSON, or classifies stderr when the run failed.
pub fn parse_value(raw: RawExecutionResult) -> TypedResult<Value> {
    if !raw.ok {
        return failure(classify(&raw.stderr));
    }
    match serde_json::from_str::<Value>(raw.stdout.trim()) {
        Ok(value) => success(value),
        Err(err) => failure(parse_error(err, &raw.stdout)),
    }
}

pub fn parse_output<T: DeserializeOwned>(raw: RawExecutionResult) -> TypedResult<T> {
    let stdout = raw.stdout.clone();
    parse_value(raw).and_then(|value| match serde_json::from_value::<T>(value) {
        Ok(data) => success(data),
        Err(err) => failure(parse_error(err, &stdout)),
    })
}

pub fn parse_entity(raw: RawExecutionResult, kind: EntityKind) -> TypedResult<Entity> {
    let stdout = raw.stdout.clone();
    parse_value(raw).and_then(|value| match Entity::from_value(kind, value) {
        Ok(entity) => success(entity),
        Err(err) => failure(parse_error(err, &stdout)),
    })
}

pub fn parse_entities(raw: RawExecutionResult, kind: EntityKind) -> TypedResult<Vec<Entity>> {
    let stdout = raw.stdout.clone();
    parse_output::<Vec<Value>>(raw).and_then(|values| {
        match values
            .into_iter()
            .map(|value| Entity::from_value(kind, value))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(entities) => success(entities),
            Err(err) => failure(parse_error(err, &stdout)),
        }
    })
}

/// Parses a page and checks its counters before tagging the items.
pub fn parse_page(raw: RawExecutionResult, kind: EntityKind) -> TypedResult<Page<Entity>> {
    let stdout = raw.stdout.clone();
    parse_output::<Page<Value>>(raw).and_then(|page| {
        if let Err(reason) = page.check() {
            return failure(parse_error(reason, &stdout));
        }
        match page.map_items(|value| Entity::from_value(kind, value)) {
            Ok(page) => success(page),
            Err(err) => failure(parse_error(err, &stdout)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HostStatus;

    fn task_json(id: &str) -> String {
        format!(
            r#"{{"id":"{}","name":"Task {}","note":null,"flagged":false,"completed":false,"dueDate":"2026-01-02T09:00:00","deferDate":null,"completionDate":null,"projectId":null,"projectName":null,"tags":[{{"id":"t1","name":"Home"}}]}}"#,
            id, id
        )
    }

    #[test]
    fn success_output_becomes_typed_payload() {
        let result: TypedResult<HostStatus> =
            parse_output(RawExecutionResult::success("{\"running\":true,\"version\":\"4.3\"}\n"));
        let status = result.into_result().expect("status");
        assert!(status.running);
        assert_eq!(status.version.as_deref(), Some("4.3"));
    }

    #[test]
    fn malformed_output_is_a_parse_error_not_a_host_error() {
        let result: TypedResult<Value> =
            parse_value(RawExecutionResult::success("{\"items\":[,]}"));
        let error = result.error().expect("error");
        assert_eq!(error.code, ErrorCode::JsonParseError);
        assert_eq!(error.detail.as_deref(), Some("{\"items\":[,]}"));
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        let result = parse_entity(RawExecutionResult::success("{\"name\":\"x\"}"), EntityKind::Task);
        assert_eq!(result.error().expect("error").code, ErrorCode::JsonParseError);
    }

    #[test]
    fn failed_run_is_classified() {
        let result: TypedResult<Value> = parse_value(RawExecutionResult::failure(
            "execution error: OmniFocus got an error: Can’t get first flattened task whose id = \"zz\". (-1728)",
        ));
        assert_eq!(result.error().expect("error").code, ErrorCode::TaskNotFound);
    }

    #[test]
    fn entities_carry_their_kind() {
        let result = parse_entity(RawExecutionResult::success(task_json("a1")), EntityKind::Task);
        let entity = result.into_result().expect("entity");
        assert_eq!(entity.kind(), EntityKind::Task);
        assert_eq!(entity.id(), Some("a1"));
        let Entity::Task(task) = entity else {
            panic!("expected task");
        };
        assert_eq!(task.tags.len(), 1);
        assert_eq!(task.due_date.as_deref(), Some("2026-01-02T09:00:00"));
    }

    #[test]
    fn page_counters_are_checked() {
        let good = format!(
            r#"{{"items":[{}],"totalCount":100,"returnedCount":1,"offset":50,"limit":1,"hasMore":true}}"#,
            task_json("x")
        );
        let page = parse_page(RawExecutionResult::success(good), EntityKind::Task)
            .into_result()
            .expect("page");
        assert_eq!(page.returned_count, 1);
        assert!(page.has_more);

        let lying = format!(
            r#"{{"items":[{}],"totalCount":100,"returnedCount":1,"offset":50,"limit":1,"hasMore":false}}"#,
            task_json("x")
        );
        let result = parse_page(RawExecutionResult::success(lying), EntityKind::Task);
        assert_eq!(result.error().expect("error").code, ErrorCode::JsonParseError);
    }

    #[test]
    fn perspective_list() {
        let result = parse_entities(
            RawExecutionResult::success(r#"[{"name":"Forecast"},{"name":"Flagged"}]"#),
            EntityKind::Perspective,
        );
        let entities = result.into_result().expect("entities");
        assert_eq!(entities.len(), 2);
        assert!(entities.iter().all(|e| e.kind() == EntityKind::Perspective));
    }
}
