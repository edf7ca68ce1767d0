use std::collections::HashMap;

use super::{error::TypeError, schema::Id};
use crate::constants::{ASSIGNED_ONLY_PARAM, INGREDIENT_FILTER_PARAM, TAG_FILTER_PARAM};

pub type FormData = HashMap<String, String>;

/// Query string values of a list request.
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    /// Integer flag; absent means false, any non-zero integer means true.
    pub fn get_flag(&self, key: &str) -> Result<bool, TypeError> {
        match self.inner.get(key) {
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map(|v| v != 0)
                .map_err(|_e| TypeError::new(&format!("'{key}' must be an integer"))),
            None => Ok(false),
        }
    }

    /// Comma-separated ids. Absent or empty means no filter.
    pub fn get_id_list(&self, key: &str) -> Result<Option<Vec<Id>>, TypeError> {
        let value = match self.inner.get(key) {
            Some(value) if !value.trim().is_empty() => value,
            _ => return Ok(None),
        };

        value
            .split(',')
            .map(|token| {
                token.trim().parse::<Id>().map_err(|_e| {
                    TypeError::new(&format!("'{key}' contains an invalid id: '{token}'"))
                })
            })
            .collect::<Result<Vec<Id>, TypeError>>()
            .map(Some)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeFilter {
    pub assigned_only: bool,
}

impl TryFrom<&Form> for AttributeFilter {
    type Error = TypeError;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        Ok(Self {
            assigned_only: form.get_flag(ASSIGNED_ONLY_PARAM)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<Id>>,
}

impl TryFrom<&Form> for RecipeFilter {
    type Error = TypeError;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        Ok(Self {
            tags: form.get_id_list(TAG_FILTER_PARAM)?,
            ingredients: form.get_id_list(INGREDIENT_FILTER_PARAM)?,
        })
    }
}
