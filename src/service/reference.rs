//! Read-only reference tables.

use super::{ListParams, Membership, Page};
use crate::error::AppResult;
use crate::model::{Country, Currency, Id, Language, Subdivision, TransactionType};
use crate::validation::Codes;

impl Membership {
    pub fn list_countries(&self, params: ListParams) -> Page<Country> {
        params.paginate(self.store.read(|t| t.countries.iter().cloned().collect()))
    }

    pub fn read_country(&self, id: Id) -> AppResult<Country> {
        self.store.read(|t| t.countries.get(id).cloned().ok_or_else(|| Codes::new("country", "read").missing(1)))
    }

    pub fn list_subdivisions(&self, country_id: Id, params: ListParams) -> AppResult<Page<Subdivision>> {
        let rows = self.store.read(|t| {
            t.countries.get(country_id).ok_or_else(|| Codes::new("subdivision", "list").missing(1))?;
            Ok::<_, crate::error::AppError>(t.subdivisions.iter().filter(|s| s.country_id == country_id).cloned().collect())
        })?;
        Ok(params.paginate(rows))
    }

    pub fn read_subdivision(&self, country_id: Id, id: Id) -> AppResult<Subdivision> {
        self.store.read(|t| {
            t.subdivisions
                .get(id)
                .filter(|s| s.country_id == country_id)
                .cloned()
                .ok_or_else(|| Codes::new("subdivision", "read").missing(1))
        })
    }

    pub fn list_currencies(&self, params: ListParams) -> Page<Currency> {
        params.paginate(self.store.read(|t| t.currencies.iter().cloned().collect()))
    }

    pub fn read_currency(&self, id: Id) -> AppResult<Currency> {
        self.store.read(|t| t.currencies.get(id).cloned().ok_or_else(|| Codes::new("currency", "read").missing(1)))
    }

    pub fn list_languages(&self, params: ListParams) -> Page<Language> {
        params.paginate(self.store.read(|t| t.languages.iter().cloned().collect()))
    }

    pub fn read_language(&self, id: Id) -> AppResult<Language> {
        self.store.read(|t| t.languages.get(id).cloned().ok_or_else(|| Codes::new("language", "read").missing(1)))
    }

    pub fn list_transaction_types(&self, params: ListParams) -> Page<TransactionType> {
        params.paginate(self.store.read(|t| t.transaction_types.iter().cloned().collect()))
    }
}
