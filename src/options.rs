use std::fmt;

use regex::Regex;
use serde::{de, Deserialize};

use crate::{OriginMatcher, OriginSetting};

/// Partial CORS configuration, usually read from a settings file.
///
/// Every field is optional. Missing fields keep the defaults of [`Cors::default()`] once the
/// options are applied with [`Cors::from_options()`].
///
/// # Examples
/// ```
/// use actix_cors_policy::{Cors, CorsOptions};
///
/// let options: CorsOptions = toml::from_str(r#"
///     origin = ["https://app.example.com", { pattern = '\.example\.org$' }]
///     methods = ["GET", "POST"]
///     credentials = true
///     exposed-headers = "x-request-id"
///     max-age = 600
/// "#).unwrap();
///
/// let cors = Cors::from_options(options);
/// ```
///
/// Origin values take one of these forms:
/// - `true` reflects any origin, `false` disables CORS;
/// - `"*"` allows any origin, any other string is sent as a fixed origin;
/// - `{ pattern = "<regex>" }` reflects origins the pattern matches;
/// - a list of strings, booleans, patterns or nested lists reflects origins any entry matches.
///
/// [`Cors::default()`]: crate::Cors::default
/// [`Cors::from_options()`]: crate::Cors::from_options
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CorsOptions {
    /// Origin policy.
    pub origin: Option<OriginSetting>,

    /// Methods sent in `Access-Control-Allow-Methods`.
    pub methods: Option<Vec<String>>,

    /// Let validated preflight requests reach the application.
    pub preflight_continue: Option<bool>,

    /// Status used to answer validated preflight requests.
    pub options_success_status: Option<u16>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub credentials: Option<bool>,

    /// Headers sent in `Access-Control-Expose-Headers`.
    pub exposed_headers: Option<HeaderList>,

    /// Headers sent in `Access-Control-Allow-Headers` on preflight responses.
    pub allowed_headers: Option<HeaderList>,

    /// `Access-Control-Max-Age` in seconds.
    pub max_age: Option<usize>,

    /// Handle `OPTIONS` requests as preflight requests.
    pub preflight: Option<bool>,

    /// Require `Origin` and `Access-Control-Request-Method` on preflight requests.
    pub strict_preflight: Option<bool>,
}

/// A header list given either as one raw string or as a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HeaderList {
    /// Sent as is.
    Raw(String),

    /// Joined with `", "`.
    List(Vec<String>),
}

impl HeaderList {
    pub(crate) fn values(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            HeaderList::Raw(raw) => std::slice::from_ref(raw),
            HeaderList::List(list) => list,
        };

        values.iter().map(String::as_str)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OriginRepr {
    Flag(bool),
    Value(String),
    Pattern { pattern: String },
    List(Vec<OriginRepr>),
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|err| format!("invalid origin pattern `{}`: {}", pattern, err))
}

impl TryFrom<OriginRepr> for OriginMatcher {
    type Error = String;

    fn try_from(repr: OriginRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            OriginRepr::Flag(allow) => OriginMatcher::Bool(allow),
            OriginRepr::Value(origin) => OriginMatcher::Exact(origin),
            OriginRepr::Pattern { pattern } => OriginMatcher::Pattern(compile(&pattern)?),
            OriginRepr::List(list) => OriginMatcher::Nested(
                list.into_iter()
                    .map(OriginMatcher::try_from)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl TryFrom<OriginRepr> for OriginSetting {
    type Error = String;

    fn try_from(repr: OriginRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            OriginRepr::Flag(reflect) => OriginSetting::from(reflect),
            OriginRepr::Value(origin) => OriginSetting::from(origin),
            OriginRepr::Pattern { pattern } => OriginSetting::Pattern(compile(&pattern)?),
            OriginRepr::List(list) => OriginSetting::List(
                list.into_iter()
                    .map(OriginMatcher::try_from)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl<'de> de::Deserialize<'de> for OriginSetting {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct Expecting;

        impl de::Expected for Expecting {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(
                    "a boolean, an origin string, a `{ pattern = \"..\" }` table or a list of those",
                )
            }
        }

        let repr = OriginRepr::deserialize(deserializer).map_err(|_| {
            <D::Error as de::Error>::invalid_type(
                de::Unexpected::Other("origin option"),
                &Expecting,
            )
        })?;

        OriginSetting::try_from(repr).map_err(de::Error::custom)
    }
}
