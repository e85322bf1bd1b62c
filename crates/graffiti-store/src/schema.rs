use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use jsonschema::Validator;
use serde_json::Value;

use graffiti_types::{GraffitiError, GraffitiObject, GraffitiResult};

/// Memoized schema compiler.
///
/// Entries are keyed by the schema's canonical JSON text and never evicted.
/// Two callers compiling the same new schema at once may both compile it;
/// the later insert wins and both results are equivalent.
#[derive(Default)]
pub struct SchemaCache {
    validators: RwLock<HashMap<String, Arc<Validator>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&self, schema: &Value) -> GraffitiResult<Arc<Validator>> {
        let key = schema.to_string();
        if let Some(validator) = self.validators.read().expect("lock poisoned").get(&key) {
            return Ok(validator.clone());
        }
        let validator = Arc::new(
            Validator::new(schema).map_err(|e| GraffitiError::InvalidSchema(e.to_string()))?,
        );
        self.validators
            .write()
            .expect("lock poisoned")
            .insert(key, validator.clone());
        Ok(validator)
    }

    pub fn len(&self) -> usize {
        self.validators.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("compiled", &self.len())
            .finish()
    }
}

/// Check an object's value against a compiled schema.
pub fn check_schema(validator: &Validator, object: &GraffitiObject) -> GraffitiResult<()> {
    if validator.is_valid(&object.value) {
        Ok(())
    } else {
        Err(GraffitiError::SchemaMismatch(format!(
            "{} does not match the provided schema",
            object.url
        )))
    }
}
