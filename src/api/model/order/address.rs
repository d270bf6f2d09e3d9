use juniper::{GraphQLInputObject, GraphQLObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{
    err::{invalid_input, ApiResult},
    model::shared::{check_length, check_required},
};


/// A postal address, stored as JSON object on the order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, GraphQLObject)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Address {
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) company_name: String,
    pub(crate) street_address1: String,
    pub(crate) street_address2: String,
    pub(crate) city: String,
    pub(crate) postal_code: String,
    /// ISO 3166-1 alpha-2 code, e.g. `DE`.
    pub(crate) country: String,
    pub(crate) country_area: String,
    pub(crate) phone: String,
}

impl Address {
    /// Reads an address from the DB. Malformed JSON is treated like no
    /// address at all.
    pub(crate) fn from_stored(value: Option<&Value>) -> Option<Self> {
        value.and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub(crate) fn to_stored(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Default, GraphQLInputObject)]
pub(crate) struct AddressInput {
    first_name: Option<String>,
    last_name: Option<String>,
    company_name: Option<String>,
    street_address1: Option<String>,
    street_address2: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
    country_area: Option<String>,
    phone: Option<String>,
}

impl AddressInput {
    /// Validates the input. `field` is the input field holding the address
    /// and is used for all errors.
    pub(crate) fn into_address(self, field: &'static str) -> ApiResult<Address> {
        let street_address1 = self.street_address1.unwrap_or_default();
        let city = self.city.unwrap_or_default();
        check_required(&street_address1, 256, field)?;
        check_required(&city, 256, field)?;

        let country = self.country.unwrap_or_default().trim().to_ascii_uppercase();
        if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(invalid_input!(
                key = "invalid",
                "'{country}' is not a two letter country code",
            ).on_field(field));
        }

        let address = Address {
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            company_name: self.company_name.unwrap_or_default(),
            street_address1,
            street_address2: self.street_address2.unwrap_or_default(),
            city,
            postal_code: self.postal_code.unwrap_or_default(),
            country,
            country_area: self.country_area.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
        };
        for value in [
            &address.first_name,
            &address.last_name,
            &address.company_name,
            &address.street_address2,
            &address.postal_code,
            &address.country_area,
            &address.phone,
        ] {
            check_length(value, 256, field)?;
        }

        Ok(address)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::{Address, AddressInput};

    fn input() -> AddressInput {
        AddressInput {
            first_name: Some("Ada".into()),
            street_address1: Some("Hauptstraße 1".into()),
            city: Some("Berlin".into()),
            country: Some(" de".into()),
            ..AddressInput::default()
        }
    }

    #[test]
    fn valid_address() {
        let address = input().into_address("shippingAddress").unwrap();
        assert_eq!(address.country, "DE");
        assert_eq!(address.first_name, "Ada");
        assert_eq!(address.last_name, "");
    }

    #[test]
    fn invalid_country() {
        let mut i = input();
        i.country = Some("Germany".into());
        assert_eq!(i.into_address("billingAddress").unwrap_err().field, Some("billingAddress"));

        let mut i = input();
        i.country = None;
        assert!(i.into_address("billingAddress").is_err());
    }

    #[test]
    fn missing_street() {
        let mut i = input();
        i.street_address1 = Some("  ".into());
        assert!(i.into_address("shippingAddress").is_err());
    }

    #[test]
    fn stored_form() {
        let address = input().into_address("shippingAddress").unwrap();
        let stored = address.to_stored();
        assert_eq!(stored["streetAddress1"], json!("Hauptstraße 1"));
        assert_eq!(Address::from_stored(Some(&stored)), Some(address));

        let partial = json!({ "city": "Bern" });
        assert_eq!(Address::from_stored(Some(&partial)).unwrap().city, "Bern");
        assert_eq!(Address::from_stored(Some(&json!([1, 2]))), None);
        assert_eq!(Address::from_stored(None), None);
    }
}
