use postgres_types::ToSql;
use tokio_postgres::Row;


/// Helper macro to pass arguments to `query_raw` and similar calls.
///
/// Helps you with casting to `&dyn ToSql` and type inference. Note: use `[]` for
/// the macro invocation, e.g. `dbargs![]`.
macro_rules! dbargs {
    () => {
        [] as [&(dyn postgres_types::ToSql + Sync); 0]
    };
    ($($arg:expr),+ $(,)?) => {
        [$($arg as &(dyn postgres_types::ToSql + Sync)),+]
    };
}

pub(crate) use dbargs;


/// Types that can be loaded from a single DB row.
///
/// `SELECT` is a comma separated list of table-qualified columns, and
/// `from_row_start` reads them in that order starting at column 0. Additional
/// columns (like window function results) can be appended after those.
pub(crate) trait FromDb: Sized {
    const SELECT: &'static str;

    fn from_row_start(row: &Row) -> Self;
}


/// A dynamically built set of `where` conditions together with the
/// parameters they reference.
///
/// Conditions are joined with `and`. Parameters are numbered in insertion
/// order, so `arg` has to be called in the order the placeholders appear in
/// the final query, which is naturally the case when conditions are added
/// one after another.
#[derive(Default)]
pub(crate) struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql + Sync + Send>>,
}

impl SqlFilter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a parameter and returns its placeholder, e.g. `$3`.
    pub(crate) fn arg(&mut self, value: impl ToSql + Sync + Send + 'static) -> String {
        self.params.push(Box::new(value));
        format!("${}", self.params.len())
    }

    /// Adds a condition. It should be self contained, i.e. bracket `or`s.
    pub(crate) fn and(&mut self, clause: impl Into<String>) -> &mut Self {
        self.clauses.push(clause.into());
        self
    }

    /// Adds `lhs = $n`.
    pub(crate) fn eq(&mut self, lhs: &str, value: impl ToSql + Sync + Send + 'static) -> &mut Self {
        let p = self.arg(value);
        self.and(format!("{lhs} = {p}"))
    }

    /// Adds a case insensitive substring match over several columns.
    pub(crate) fn search(&mut self, columns: &[&str], needle: &str) -> &mut Self {
        let needle = needle.trim();
        if needle.is_empty() || columns.is_empty() {
            return self;
        }

        let p = self.arg(format!("%{}%", escape_like(needle)));
        let ors = columns.iter()
            .map(|c| format!("{c}::text ilike {p}"))
            .collect::<Vec<_>>()
            .join(" or ");
        self.and(format!("({ors})"))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns `where ...` or an empty string if there are no conditions.
    pub(crate) fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("where {}", self.clauses.join(" and "))
        }
    }

    pub(crate) fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| &**p as &(dyn ToSql + Sync)).collect()
    }

    pub(crate) fn num_params(&self) -> usize {
        self.params.len()
    }
}

/// Column assignments for `insert` and `update` statements, collected from
/// optional input fields.
#[derive(Default, Debug)]
pub(crate) struct SqlAssignments {
    columns: Vec<&'static str>,
    values: Vec<String>,
    params: Vec<Box<dyn ToSql + Sync + Send>>,
}

impl SqlAssignments {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Assigns a parameter to `column`.
    pub(crate) fn set(
        &mut self,
        column: &'static str,
        value: impl ToSql + Sync + Send + 'static,
    ) -> &mut Self {
        self.params.push(Box::new(value));
        let placeholder = format!("${}", self.params.len());
        self.set_expr(column, placeholder)
    }

    /// Like `set`, but does nothing for `None`. To set a column to `null`,
    /// use `set` with an `Option`.
    pub(crate) fn set_some<T: ToSql + Sync + Send + 'static>(
        &mut self,
        column: &'static str,
        value: Option<T>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    /// Assigns a raw SQL expression that does not reference parameters.
    pub(crate) fn set_expr(&mut self, column: &'static str, expr: impl Into<String>) -> &mut Self {
        self.columns.push(column);
        self.values.push(expr.into());
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }

    /// Returns `a = $1, b = $2` for `update ... set`.
    pub(crate) fn set_clause(&self) -> String {
        self.columns.iter()
            .zip(&self.values)
            .map(|(c, v)| format!("{c} = {v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns `(a, b) values ($1, $2)` for `insert into`.
    pub(crate) fn insert_clause(&self) -> String {
        if self.columns.is_empty() {
            "default values".into()
        } else {
            format!("({}) values ({})", self.columns.join(", "), self.values.join(", "))
        }
    }

    pub(crate) fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| &**p as &(dyn ToSql + Sync)).collect()
    }

    pub(crate) fn num_params(&self) -> usize {
        self.params.len()
    }
}

/// Escapes `%`, `_` and `\` for use in a `like` pattern.
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}


#[cfg(test)]
mod tests {
    use super::{SqlAssignments, SqlFilter, escape_like};

    #[test]
    fn empty_filter() {
        let f = SqlFilter::new();
        assert!(f.is_empty());
        assert_eq!(f.where_clause(), "");
        assert_eq!(f.num_params(), 0);
    }

    #[test]
    fn placeholders_are_numbered() {
        let mut f = SqlFilter::new();
        f.eq("products.is_published", true);
        let p = f.arg(10i32);
        f.and(format!("products.price >= {p}"));
        assert_eq!(
            f.where_clause(),
            "where products.is_published = $1 and products.price >= $2",
        );
        assert_eq!(f.num_params(), 2);
        assert_eq!(f.params().len(), 2);
    }

    #[test]
    fn search_over_columns() {
        let mut f = SqlFilter::new();
        f.search(&["sales.name", "sales.value"], "  summer ");
        assert_eq!(f.where_clause(), "where (sales.name::text ilike $1 or sales.value::text ilike $1)");

        let mut blank = SqlFilter::new();
        blank.search(&["sales.name"], "   ");
        assert!(blank.is_empty());
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn assignments() {
        let mut a = SqlAssignments::new();
        assert_eq!(a.insert_clause(), "default values");
        a.set("title", "About".to_owned())
            .set_some("seo_title", None::<String>)
            .set_some("is_published", Some(true))
            .set_expr("updated_at", "now()");
        assert_eq!(a.set_clause(), "title = $1, is_published = $2, updated_at = now()");
        assert_eq!(a.insert_clause(), "(title, is_published, updated_at) values ($1, $2, now())");
        assert!(a.contains("title"));
        assert!(!a.contains("seo_title"));
        assert_eq!(a.num_params(), 2);
    }
}
