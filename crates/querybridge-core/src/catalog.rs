//! Column type catalog.
//!
//! Each dialect publishes a [`ColumnTypeSelector`]: the types a UI offers,
//! their parameters with bounds, and a description. Parameterized types are
//! validated here before a type string reaches DDL.

use crate::error::{Error, Result};

/// Renders a description from the parameters entered so far.
pub type DescribeFn = fn(&str, &[String]) -> String;

/// Cross-parameter rule, returning the offending parameter and message.
pub type ParameterRule = fn(&[u32]) -> std::result::Result<(), (&'static str, String)>;

/// Description of a type, fixed or computed from its parameters.
#[derive(Debug, Clone, Copy)]
pub enum TypeDescription {
    Static(&'static str),
    Dynamic(DescribeFn),
}

/// One parameter of a parameterized type, with inclusive bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub min: u32,
    pub max: u32,
    pub default: Option<u32>,
    pub required: bool,
}

impl TypeParameter {
    /// Optional parameter bounded by `min..=max`.
    #[must_use]
    pub const fn new(name: &'static str, min: u32, max: u32) -> Self {
        Self {
            name,
            description: None,
            min,
            max,
            default: None,
            required: false,
        }
    }

    /// Sets the help text shown next to the input.
    #[must_use]
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets the value the UI prefills.
    #[must_use]
    pub const fn default(mut self, value: u32) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the parameter as mandatory.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A type offered by the catalog.
#[derive(Debug, Clone)]
pub struct TypeSuggestion {
    pub name: &'static str,
    pub description: TypeDescription,
    pub parameters: Vec<TypeParameter>,
    pub rule: Option<ParameterRule>,
}

impl TypeSuggestion {
    /// Type without parameters.
    #[must_use]
    pub const fn plain(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description: TypeDescription::Static(description),
            parameters: Vec::new(),
            rule: None,
        }
    }

    /// Type with parameters.
    #[must_use]
    pub const fn parameterized(
        name: &'static str,
        description: TypeDescription,
        parameters: Vec<TypeParameter>,
    ) -> Self {
        Self {
            name,
            description,
            parameters,
            rule: None,
        }
    }

    /// Attaches a rule checked after per-parameter bounds.
    #[must_use]
    pub fn with_rule(mut self, rule: ParameterRule) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Describes the type as parameterized by `params`.
    #[must_use]
    pub fn describe(&self, params: &[String]) -> String {
        match self.description {
            TypeDescription::Static(text) => text.to_string(),
            TypeDescription::Dynamic(describe) => describe(self.name, params),
        }
    }

    /// Validates `params` and renders the type string.
    ///
    /// Omitted optional parameters are left out of the rendered string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTypeParameter`] when a parameter is missing,
    /// not an integer, out of bounds, or breaks the type's rule.
    pub fn format(&self, params: &[&str]) -> Result<String> {
        if params.len() > self.parameters.len() {
            return Err(Error::invalid_parameter(
                self.name,
                "parameters",
                format!(
                    "expected at most {} parameters, got {}",
                    self.parameters.len(),
                    params.len()
                ),
            ));
        }

        let mut values = Vec::with_capacity(params.len());
        for (parameter, raw) in self.parameters.iter().zip(params) {
            let value = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|v| (parameter.min..=parameter.max).contains(v))
                .ok_or_else(|| {
                    Error::invalid_parameter(
                        self.name,
                        parameter.name,
                        format!(
                            "{} must be an integer between {} and {}",
                            parameter.name, parameter.min, parameter.max
                        ),
                    )
                })?;
            values.push(value);
        }

        if let Some(missing) = self
            .parameters
            .iter()
            .skip(values.len())
            .find(|p| p.required)
        {
            return Err(Error::invalid_parameter(
                self.name,
                missing.name,
                "a value is required",
            ));
        }

        if let Some(rule) = self.rule {
            rule(&values).map_err(|(parameter, message)| {
                Error::invalid_parameter(self.name, parameter, message)
            })?;
        }

        if values.is_empty() {
            return Ok(self.name.to_string());
        }
        let rendered: Vec<String> = values.iter().map(u32::to_string).collect();
        Ok(format!("{}({})", self.name, rendered.join(",")))
    }
}

/// A named group of suggestions (numeric, text, ...).
#[derive(Debug, Clone)]
pub struct TypeSuggestionGroup {
    pub name: &'static str,
    pub suggestions: Vec<TypeSuggestion>,
}

/// Type catalog of a dialect.
#[derive(Debug, Clone, Default)]
pub struct ColumnTypeSelector {
    pub groups: Vec<TypeSuggestionGroup>,
}

impl ColumnTypeSelector {
    /// Appends a group.
    #[must_use]
    pub fn group(mut self, name: &'static str, suggestions: Vec<TypeSuggestion>) -> Self {
        self.groups.push(TypeSuggestionGroup { name, suggestions });
        self
    }

    /// Finds a suggestion by case-insensitive name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&TypeSuggestion> {
        self.groups
            .iter()
            .flat_map(|g| g.suggestions.iter())
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Validates a type name and its parameters, returning the type string.
    ///
    /// Names absent from the catalog are accepted when they are made of
    /// letters, digits, underscores and spaces; their parameters must still
    /// be integers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTypeParameter`] for malformed names or
    /// parameters.
    pub fn validate_type(&self, name: &str, params: &[&str]) -> Result<String> {
        let name = name.trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
        {
            return Err(Error::invalid_parameter(
                name,
                "name",
                "type names may only contain letters, digits, underscores and spaces",
            ));
        }

        if let Some(suggestion) = self.find(name) {
            return suggestion.format(params);
        }

        for raw in params {
            if raw.trim().parse::<u32>().is_err() {
                return Err(Error::invalid_parameter(
                    name,
                    "parameters",
                    format!("'{}' is not a non-negative integer", raw.trim()),
                ));
            }
        }
        if params.is_empty() {
            Ok(name.to_string())
        } else {
            let trimmed: Vec<&str> = params.iter().map(|p| p.trim()).collect();
            Ok(format!("{name}({})", trimmed.join(",")))
        }
    }

    /// Parses and validates a full type string such as `decimal(10, 2)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTypeParameter`] for unbalanced parentheses or
    /// any error of [`Self::validate_type`].
    pub fn validate(&self, type_string: &str) -> Result<String> {
        let (name, params) = parse_type(type_string)?;
        self.validate_type(name, &params)
    }
}

/// Splits `decimal(10,2)` into `("decimal", ["10", "2"])`.
///
/// # Errors
///
/// Returns [`Error::InvalidTypeParameter`] when the parentheses are
/// malformed.
pub fn parse_type(type_string: &str) -> Result<(&str, Vec<&str>)> {
    let type_string = type_string.trim();
    let Some(open) = type_string.find('(') else {
        return Ok((type_string, Vec::new()));
    };
    let name = type_string[..open].trim();
    let rest = &type_string[open + 1..];
    let Some(inner) = rest.strip_suffix(')') else {
        return Err(Error::invalid_parameter(
            name,
            "parameters",
            "missing closing parenthesis",
        ));
    };
    if inner.contains(['(', ')']) {
        return Err(Error::invalid_parameter(
            name,
            "parameters",
            "nested parentheses are not allowed",
        ));
    }
    if inner.trim().is_empty() {
        return Ok((name, Vec::new()));
    }
    Ok((name, inner.split(',').map(str::trim).collect()))
}

const DIGITS: &str = "12345678901234567890";

/// Describes a fixed-point type with a digit preview, e.g. `123.45` for
/// precision 5 and scale 2.
#[must_use]
pub fn describe_fixed_point(_name: &str, params: &[String]) -> String {
    let title = "Fixed-point number with exact precision";
    let precision = params.first().and_then(|p| p.trim().parse::<usize>().ok());
    let scale = params
        .get(1)
        .and_then(|p| p.trim().parse::<usize>().ok())
        .unwrap_or(0);

    match precision {
        Some(precision) if (1..=DIGITS.len()).contains(&precision) && scale <= precision => {
            let (integral, fractional) = DIGITS[..precision].split_at(precision - scale);
            let integral = if integral.is_empty() { "0" } else { integral };
            if fractional.is_empty() {
                format!("{title}\nExample: {integral}")
            } else {
                format!("{title}\nExample: {integral}.{fractional}")
            }
        }
        _ => title.to_string(),
    }
}

/// Rejects a scale larger than the precision.
///
/// # Errors
///
/// Returns the offending parameter and a message.
pub fn scale_within_precision(values: &[u32]) -> std::result::Result<(), (&'static str, String)> {
    match values {
        [precision, scale, ..] if scale > precision => Err((
            "scale",
            format!("scale {scale} must not exceed precision {precision}"),
        )),
        _ => Ok(()),
    }
}
