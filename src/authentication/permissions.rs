use sqlx::{Postgres, QueryBuilder};

use crate::{
    error::{Error, HtmlError},
    jwt::SessionData,
    schema::Id,
};

/// Rows that belong to exactly one user.
pub trait Owned {
    fn owner_id(&self) -> Id;
}

/// The set of rows a single caller may see. Built per request from the
/// session, never shared between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerScope {
    owner_id: Id,
}

impl OwnerScope {
    pub fn of(session: &SessionData) -> Self {
        Self {
            owner_id: session.user_id,
        }
    }

    pub fn owner_id(&self) -> Id {
        self.owner_id
    }

    /// Appends `<column> = <owner>` to a query whose WHERE clause is open.
    pub fn restrict(&self, query: &mut QueryBuilder<'_, Postgres>, column: &str) {
        query.push(column);
        query.push(" = ");
        query.push_bind(self.owner_id);
    }

    pub fn allows<T: Owned>(&self, row: &T) -> bool {
        row.owner_id() == self.owner_id
    }

    /// Rows owned by someone else are reported exactly like missing rows.
    pub fn check<T: Owned>(&self, row: Option<T>) -> Result<T, Error> {
        match row {
            Some(row) if self.allows(&row) => Ok(row),
            Some(_) => {
                log::debug!("User {} requested a row it does not own", self.owner_id);
                Err(HtmlError::NotFound.default())
            }
            None => Err(HtmlError::NotFound.default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Tag;

    fn scope(owner_id: Id) -> OwnerScope {
        OwnerScope { owner_id }
    }

    fn tag(user_id: Id) -> Tag {
        Tag {
            id: 1,
            name: String::from("Vegan"),
            user_id,
        }
    }

    #[test]
    fn own_rows_pass() {
        assert_eq!(scope(1).check(Some(tag(1))).unwrap(), tag(1));
    }

    #[test]
    fn foreign_rows_look_missing() {
        let foreign = scope(1).check(Some(tag(2))).unwrap_err();
        let missing = scope(1).check::<Tag>(None).unwrap_err();

        assert_eq!(foreign, missing);
        assert_eq!(foreign.code, 404);
    }

    #[test]
    fn restrict_binds_owner() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM tags WHERE ");
        scope(3).restrict(&mut query, "user_id");

        assert_eq!(query.sql(), "SELECT * FROM tags WHERE user_id = $1");
    }

    #[test]
    fn scope_comes_from_session() {
        let session = SessionData {
            user_id: 5,
            email: String::from("test@example.com"),
            is_staff: false,
            is_superuser: false,
        };

        assert_eq!(OwnerScope::of(&session).owner_id(), 5);
    }
}
