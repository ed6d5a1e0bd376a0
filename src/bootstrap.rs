//! First-start seeding: reference data, the root Member and the superuser.

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::model::*;
use crate::store::{Store, Tables};

/// Insert the static reference tables when they are empty.
pub fn seed_reference_data(t: &mut Tables) {
    if t.countries.len_all() > 0 {
        return;
    }
    for (id, code, name) in [(1, "IE", "Ireland"), (2, "GB", "United Kingdom"), (3, "US", "United States")] {
        t.countries.put(Country { id, code: code.into(), name: name.into() });
    }
    for (id, country_id, code, name) in [
        (1, 1, "IE-D", "Dublin"),
        (2, 1, "IE-CO", "Cork"),
        (3, 2, "GB-ENG", "England"),
        (4, 2, "GB-SCT", "Scotland"),
        (5, 3, "US-CA", "California"),
        (6, 3, "US-NY", "New York"),
    ] {
        t.subdivisions.put(Subdivision { id, country_id, code: code.into(), name: name.into() });
    }
    for (id, code, name, symbol) in [(1, "EUR", "Euro", "€"), (2, "GBP", "Pound Sterling", "£"), (3, "USD", "US Dollar", "$")] {
        t.currencies.put(Currency { id, code: code.into(), name: name.into(), symbol: symbol.into() });
    }
    for (id, code, name) in [(1, "en", "English"), (2, "ga", "Irish"), (3, "fr", "French"), (4, "de", "German")] {
        t.languages.put(Language { id, code: code.into(), name: name.into() });
    }
    for (id, name) in [(1, "Sales Invoice"), (2, "Purchase Order"), (3, "Sales Quotation"), (4, "Credit Note")] {
        t.transaction_types.put(TransactionType { id, name: name.into() });
    }
}

/// Create the root Member, its cloud_region Address and the superuser (id 1) unless they
/// already exist, then make sure the superuser has a directory account. Returns true when
/// the records were created.
pub async fn ensure_root(store: &Store, collaborators: &Collaborators, config: &Config) -> Result<bool> {
    let created = store.write(|t| {
        seed_reference_data(t);
        if t.users.get_any(SUPERUSER_ID).is_some() {
            return false;
        }
        let member = t.members.insert_with(|id| Member {
            id,
            name: "Membership Root".into(),
            currency_id: 1,
            gln_prefix: String::new(),
            self_managed: true,
            secret: false,
            api_key: generate_api_key(),
            lifecycle: Lifecycle::Active,
        });
        t.ensure_member_link(member.id, member.id);
        let address = t.addresses.insert_with(|id| Address {
            id,
            member_id: member.id,
            name: "Head Office".into(),
            address1: "1 Main Street".into(),
            address2: String::new(),
            address3: String::new(),
            city: "Dublin".into(),
            country_id: 1,
            subdivision_id: Some(1),
            postcode: String::new(),
            phones: Vec::new(),
            email: config.root_email.clone(),
            website: String::new(),
            gln: String::new(),
            vat_number: String::new(),
            language_id: 1,
            currency_id: 1,
            billing_address_id: None,
            cloud_region: true,
            lifecycle: Lifecycle::Active,
        });
        t.ensure_address_link(address.id, address.id);
        let today = Utc::now().date_naive();
        t.users.put(User {
            id: SUPERUSER_ID,
            member_id: member.id,
            address_id: address.id,
            first_name: "Root".into(),
            surname: "User".into(),
            email: config.root_email.to_lowercase(),
            administrator: true,
            global_user: true,
            global_active: true,
            is_private: false,
            robot: false,
            otp: false,
            first_otp: None,
            timezone: "UTC".into(),
            start_date: today,
            expiry_date: today + Duration::days(365 * 100),
            language_id: 1,
            profile_id: None,
            department_id: None,
            job_title: String::new(),
            phones: Vec::new(),
            image: None,
            signature: String::new(),
            notifications: Vec::new(),
            email_confirmed: true,
            last_login: None,
            lifecycle: Lifecycle::Active,
        });
        true
    });
    if created {
        info!(target: "membership::bootstrap", "seeded root member, root address and superuser {}", config.root_email);
    }

    // The directory is external state; re-check it on every start.
    let (email, member_id) = match store.read(|t| t.users.get_any(SUPERUSER_ID).map(|u| (u.email.clone(), u.member_id))) {
        Some(found) => found,
        None => return Ok(created),
    };
    let directory = &collaborators.directory;
    match directory.exists(&email).await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = directory.create(&email, &config.root_password, member_id).await {
                warn!(target: "membership::bootstrap", "could not create directory account for {}: {}", email, e);
            }
        }
        Err(e) => warn!(target: "membership::bootstrap", "directory check for {} failed: {}", email, e),
    }
    Ok(created)
}
