//! Host input/output contracts

use crate::value::DataType;

/// A named, typed value the host supplies or reads
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueSlot {
    pub name: String,
    pub data_type: DataType,
}

/// A named repeating group with its own shape
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionSlot {
    pub name: String,
    pub shape: Shape,
}

/// Slots of one side of the host contract
///
/// ```rust
/// use formcomp_compiler::{DataType, Shape};
///
/// let inputs = Shape::new()
///     .value("customer", DataType::String)
///     .section("orders", Shape::new().value("amount", DataType::Numeric));
/// assert_eq!(inputs.value_slot("Customer").unwrap().data_type, DataType::String);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    pub values: Vec<ValueSlot>,
    pub sections: Vec<SectionSlot>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.values.push(ValueSlot {
            name: name.into(),
            data_type,
        });
        self
    }

    pub fn section(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.sections.push(SectionSlot {
            name: name.into(),
            shape,
        });
        self
    }

    /// Look up a value slot (case-insensitive)
    pub fn value_slot(&self, name: &str) -> Option<&ValueSlot> {
        self.values.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Look up a section slot (case-insensitive)
    pub fn section_slot(&self, name: &str) -> Option<&SectionSlot> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}
