use chrono::NaiveDate;
use sqlx::MySql;
use sqlx::mysql::MySqlArguments;
use sqlx::query::{Query, QueryAs, QueryScalar};

/// Typed value bound to a `?` placeholder of a dynamic WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    I64(i64),
    Str(String),
    Date(NaiveDate),
}

impl From<u64> for FilterValue {
    fn from(v: u64) -> Self {
        FilterValue::U64(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::I64(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Str(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Str(v)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(v: NaiveDate) -> Self {
        FilterValue::Date(v)
    }
}

macro_rules! bind_filters {
    ($query:expr, $args:expr) => {{
        let mut q = $query;
        for arg in $args {
            q = match arg {
                FilterValue::U64(v) => q.bind(*v),
                FilterValue::I64(v) => q.bind(*v),
                FilterValue::Str(v) => q.bind(v.clone()),
                FilterValue::Date(v) => q.bind(*v),
            };
        }
        q
    }};
}

/// Accumulates `AND ...` conditions and their bind values. Clauses are
/// static SQL fragments; user input only ever travels as bound values.
#[derive(Debug, Clone)]
pub struct Filters {
    where_sql: String,
    args: Vec<FilterValue>,
}

impl Default for Filters {
    fn default() -> Self {
        Self::new()
    }
}

impl Filters {
    pub fn new() -> Self {
        Self {
            where_sql: String::from(" WHERE 1=1"),
            args: Vec::new(),
        }
    }

    /// Adds a clause holding exactly one `?`.
    pub fn push(&mut self, clause: &'static str, value: impl Into<FilterValue>) -> &mut Self {
        self.where_sql.push_str(" AND ");
        self.where_sql.push_str(clause);
        self.args.push(value.into());
        self
    }

    /// Adds a clause whose `?` count equals the number of values.
    pub fn push_many<V, I>(&mut self, clause: &'static str, values: I) -> &mut Self
    where
        V: Into<FilterValue>,
        I: IntoIterator<Item = V>,
    {
        self.where_sql.push_str(" AND ");
        self.where_sql.push_str(clause);
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn push_opt<V: Into<FilterValue>>(
        &mut self,
        clause: &'static str,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(v) = value {
            self.push(clause, v);
        }
        self
    }

    /// `column IN (?, ?, ...)`; an empty list matches nothing.
    pub fn push_in(&mut self, column: &'static str, ids: &[u64]) -> &mut Self {
        if ids.is_empty() {
            self.where_sql.push_str(" AND 1=0");
            return self;
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        self.where_sql
            .push_str(&format!(" AND {column} IN ({placeholders})"));
        self.args.extend(ids.iter().map(|id| FilterValue::U64(*id)));
        self
    }

    pub fn sql(&self) -> &str {
        &self.where_sql
    }

    pub fn args(&self) -> &[FilterValue] {
        &self.args
    }

    pub fn bind<'q>(&self, query: Query<'q, MySql, MySqlArguments>) -> Query<'q, MySql, MySqlArguments> {
        bind_filters!(query, &self.args)
    }

    pub fn bind_as<'q, O>(
        &self,
        query: QueryAs<'q, MySql, O, MySqlArguments>,
    ) -> QueryAs<'q, MySql, O, MySqlArguments> {
        bind_filters!(query, &self.args)
    }

    pub fn bind_scalar<'q, O>(
        &self,
        query: QueryScalar<'q, MySql, O, MySqlArguments>,
    ) -> QueryScalar<'q, MySql, O, MySqlArguments> {
        bind_filters!(query, &self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_clause_and_args_in_order() {
        let mut f = Filters::new();
        f.push("status = ?", "pending")
            .push_opt("employee_id = ?", Some(7u64))
            .push_opt::<u64>("customer_id = ?", None);
        assert_eq!(f.sql(), " WHERE 1=1 AND status = ? AND employee_id = ?");
        assert_eq!(
            f.args(),
            &[FilterValue::Str("pending".to_string()), FilterValue::U64(7)]
        );
    }

    #[test]
    fn multi_placeholder_clause_keeps_value_order() {
        let mut f = Filters::new();
        f.push_many("(a LIKE ? OR b LIKE ?)", ["%x%", "%y%"]);
        assert_eq!(f.sql(), " WHERE 1=1 AND (a LIKE ? OR b LIKE ?)");
        assert_eq!(f.args()[1], FilterValue::Str("%y%".to_string()));
    }

    #[test]
    fn in_list_expands_placeholders() {
        let mut f = Filters::new();
        f.push_in("employee_id", &[1, 2, 3]);
        assert_eq!(f.sql(), " WHERE 1=1 AND employee_id IN (?, ?, ?)");
        assert_eq!(f.args().len(), 3);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut f = Filters::new();
        f.push_in("employee_id", &[]);
        assert!(f.sql().ends_with("AND 1=0"));
        assert!(f.args().is_empty());
    }
}
