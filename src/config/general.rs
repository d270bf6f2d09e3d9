use serde::Deserialize;


#[derive(Debug, confique::Config)]
pub(crate) struct GeneralConfig {
    /// Name of the shop. Only used in log output.
    #[config(default = "Emporium")]
    pub(crate) shop_name: String,

    /// ISO 4217 code of the currency all prices, totals and discount values
    /// are stored in.
    #[config(default = "USD")]
    pub(crate) currency: Currency,

    /// Language codes that translations can be created for. Translating into
    /// any other language is rejected.
    #[config(default = ["de", "en", "es", "fr", "it", "nl", "pl", "pt"])]
    pub(crate) languages: Vec<String>,
}

/// A three letter uppercase currency code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub(crate) struct Currency(String);

impl Currency {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() == 3 && value.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(value))
        } else {
            Err(format!("invalid currency code '{value}': expected three uppercase letters"))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::Currency;

    #[test]
    fn currency_codes() {
        assert!(Currency::try_from("EUR".to_owned()).is_ok());
        assert!(Currency::try_from("usd".to_owned()).is_err());
        assert!(Currency::try_from("EURO".to_owned()).is_err());
        assert!(Currency::try_from("".to_owned()).is_err());
    }
}
