//! Whitelisted function table.
//!
//! Every function name in an AQL query must resolve against this registry;
//! anything else is rejected before SQL generation, which keeps the emitted
//! statement free of attacker-chosen identifiers. Lookup is
//! case-insensitive; the resolver canonicalizes call sites to the spelling
//! recorded here so both printer dialects emit one form.

use std::collections::HashMap;

use crate::schema::types::ScalarType;

#[derive(Debug, Clone, Copy)]
pub struct FunctionSpec {
    /// Canonical spelling emitted in SQL.
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for variadic functions.
    pub max_args: Option<usize>,
    pub aggregate: bool,
    pub returns: ScalarType,
}

pub fn lookup_function(name: &str) -> Option<&'static FunctionSpec> {
    FUNCTIONS.get(name.to_lowercase().as_str())
}

pub fn is_aggregate(name: &str) -> bool {
    lookup_function(name).map(|f| f.aggregate).unwrap_or(false)
}

lazy_static::lazy_static! {
    static ref FUNCTIONS: HashMap<&'static str, FunctionSpec> = {
        let mut m: HashMap<&'static str, FunctionSpec> = HashMap::new();

        let mut insert = |spec: FunctionSpec, key: &'static str| {
            m.insert(key, spec);
        };

        // ===== AGGREGATES =====
        insert(FunctionSpec { name: "count", min_args: 0, max_args: Some(1), aggregate: true, returns: ScalarType::Integer }, "count");
        insert(FunctionSpec { name: "sum", min_args: 1, max_args: Some(1), aggregate: true, returns: ScalarType::Float }, "sum");
        insert(FunctionSpec { name: "avg", min_args: 1, max_args: Some(1), aggregate: true, returns: ScalarType::Float }, "avg");
        insert(FunctionSpec { name: "min", min_args: 1, max_args: Some(1), aggregate: true, returns: ScalarType::Unknown }, "min");
        insert(FunctionSpec { name: "max", min_args: 1, max_args: Some(1), aggregate: true, returns: ScalarType::Unknown }, "max");
        insert(FunctionSpec { name: "any", min_args: 1, max_args: Some(1), aggregate: true, returns: ScalarType::Unknown }, "any");
        insert(FunctionSpec { name: "anyLast", min_args: 1, max_args: Some(1), aggregate: true, returns: ScalarType::Unknown }, "anylast");
        insert(FunctionSpec { name: "uniq", min_args: 1, max_args: None, aggregate: true, returns: ScalarType::Integer }, "uniq");
        insert(FunctionSpec { name: "argMax", min_args: 2, max_args: Some(2), aggregate: true, returns: ScalarType::Unknown }, "argmax");
        insert(FunctionSpec { name: "argMin", min_args: 2, max_args: Some(2), aggregate: true, returns: ScalarType::Unknown }, "argmin");

        // ===== COMPARISON / BOOLEAN =====
        insert(FunctionSpec { name: "equals", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "equals");
        insert(FunctionSpec { name: "notEquals", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "notequals");
        insert(FunctionSpec { name: "less", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "less");
        insert(FunctionSpec { name: "lessOrEquals", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "lessorequals");
        insert(FunctionSpec { name: "greater", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "greater");
        insert(FunctionSpec { name: "greaterOrEquals", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "greaterorequals");
        insert(FunctionSpec { name: "like", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "like");
        insert(FunctionSpec { name: "ilike", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "ilike");
        insert(FunctionSpec { name: "notLike", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "notlike");
        insert(FunctionSpec { name: "in", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "in");
        insert(FunctionSpec { name: "notIn", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Boolean }, "notin");
        insert(FunctionSpec { name: "and", min_args: 1, max_args: None, aggregate: false, returns: ScalarType::Boolean }, "and");
        insert(FunctionSpec { name: "or", min_args: 1, max_args: None, aggregate: false, returns: ScalarType::Boolean }, "or");
        insert(FunctionSpec { name: "not", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::Boolean }, "not");
        insert(FunctionSpec { name: "isNull", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::Boolean }, "isnull");
        insert(FunctionSpec { name: "isNotNull", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::Boolean }, "isnotnull");

        // ===== ARITHMETIC =====
        insert(FunctionSpec { name: "plus", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Unknown }, "plus");
        insert(FunctionSpec { name: "minus", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Unknown }, "minus");
        insert(FunctionSpec { name: "multiply", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Unknown }, "multiply");
        insert(FunctionSpec { name: "divide", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Float }, "divide");
        insert(FunctionSpec { name: "modulo", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Integer }, "modulo");
        insert(FunctionSpec { name: "negate", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::Unknown }, "negate");
        insert(FunctionSpec { name: "abs", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::Unknown }, "abs");
        insert(FunctionSpec { name: "floor", min_args: 1, max_args: Some(2), aggregate: false, returns: ScalarType::Float }, "floor");
        insert(FunctionSpec { name: "ceil", min_args: 1, max_args: Some(2), aggregate: false, returns: ScalarType::Float }, "ceil");
        insert(FunctionSpec { name: "round", min_args: 1, max_args: Some(2), aggregate: false, returns: ScalarType::Float }, "round");

        // ===== CONVERSION =====
        insert(FunctionSpec { name: "toFloat64OrNull", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::Float }, "tofloat64ornull");
        insert(FunctionSpec { name: "toInt64OrNull", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::Integer }, "toint64ornull");
        insert(FunctionSpec { name: "toString", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::String }, "tostring");
        insert(FunctionSpec { name: "toUUID", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::Uuid }, "touuid");
        insert(FunctionSpec { name: "toDateTime", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::DateTime }, "todatetime");
        insert(FunctionSpec { name: "parseDateTimeBestEffort", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::DateTime }, "parsedatetimebesteffort");

        // ===== DATE / TIME =====
        insert(FunctionSpec { name: "now", min_args: 0, max_args: Some(0), aggregate: false, returns: ScalarType::DateTime }, "now");
        insert(FunctionSpec { name: "today", min_args: 0, max_args: Some(0), aggregate: false, returns: ScalarType::DateTime }, "today");
        insert(FunctionSpec { name: "toStartOfDay", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::DateTime }, "tostartofday");
        insert(FunctionSpec { name: "toStartOfWeek", min_args: 1, max_args: Some(2), aggregate: false, returns: ScalarType::DateTime }, "tostartofweek");
        insert(FunctionSpec { name: "toStartOfMonth", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::DateTime }, "tostartofmonth");
        insert(FunctionSpec { name: "toUnixTimestamp", min_args: 1, max_args: Some(2), aggregate: false, returns: ScalarType::Integer }, "tounixtimestamp");
        insert(FunctionSpec { name: "dateDiff", min_args: 3, max_args: Some(3), aggregate: false, returns: ScalarType::Integer }, "datediff");

        // ===== STRING =====
        insert(FunctionSpec { name: "concat", min_args: 1, max_args: None, aggregate: false, returns: ScalarType::String }, "concat");
        insert(FunctionSpec { name: "lower", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::String }, "lower");
        insert(FunctionSpec { name: "upper", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::String }, "upper");
        insert(FunctionSpec { name: "trim", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::String }, "trim");
        insert(FunctionSpec { name: "length", min_args: 1, max_args: Some(1), aggregate: false, returns: ScalarType::Integer }, "length");
        insert(FunctionSpec { name: "substring", min_args: 2, max_args: Some(3), aggregate: false, returns: ScalarType::String }, "substring");
        insert(FunctionSpec { name: "position", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Integer }, "position");
        insert(FunctionSpec { name: "replaceRegexpAll", min_args: 3, max_args: Some(3), aggregate: false, returns: ScalarType::String }, "replaceregexpall");
        insert(FunctionSpec { name: "JSONExtractRaw", min_args: 2, max_args: None, aggregate: false, returns: ScalarType::String }, "jsonextractraw");

        // ===== CONDITIONAL =====
        insert(FunctionSpec { name: "if", min_args: 3, max_args: Some(3), aggregate: false, returns: ScalarType::Unknown }, "if");
        insert(FunctionSpec { name: "multiIf", min_args: 3, max_args: None, aggregate: false, returns: ScalarType::Unknown }, "multiif");
        insert(FunctionSpec { name: "coalesce", min_args: 1, max_args: None, aggregate: false, returns: ScalarType::Unknown }, "coalesce");
        insert(FunctionSpec { name: "ifNull", min_args: 2, max_args: Some(2), aggregate: false, returns: ScalarType::Unknown }, "ifnull");
        insert(FunctionSpec { name: "tuple", min_args: 1, max_args: None, aggregate: false, returns: ScalarType::Unknown }, "tuple");

        m
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_with_canonical_spelling() {
        let spec = lookup_function("ARGMAX").unwrap();
        assert_eq!(spec.name, "argMax");
        assert!(spec.aggregate);
    }

    #[test]
    fn unknown_function_misses() {
        assert!(lookup_function("sleepEachRow").is_none());
    }

    #[test]
    fn count_is_aggregate_equals_is_not() {
        assert!(is_aggregate("count"));
        assert!(!is_aggregate("equals"));
    }
}
