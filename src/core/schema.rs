//! The entity type taxonomy.
//!
//! Schemata form a small inheritance graph (`Person` extends `LegalEntity`,
//! which extends `Thing`). Properties are inherited from every ancestor. The
//! taxonomy is static data: it is compiled into the binary and never mutated.

use serde::Serialize;

/// Value type of a property. Drives both query construction and scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Name,
    Text,
    Date,
    Country,
    Identifier,
    Address,
    Topic,
    Url,
    /// Reference to another entity by id
    Entity,
}

/// A property definition on a schema
#[derive(Debug)]
pub struct Property {
    pub name: &'static str,
    pub ptype: PropertyType,
    /// For entity references: the name under which this edge shows up on the
    /// referenced entity when nested records are inlined.
    pub reverse: Option<&'static str>,
}

const fn prop(name: &'static str, ptype: PropertyType) -> Property {
    Property {
        name,
        ptype,
        reverse: None,
    }
}

const fn edge(name: &'static str, reverse: &'static str) -> Property {
    Property {
        name,
        ptype: PropertyType::Entity,
        reverse: Some(reverse),
    }
}

/// A node in the type taxonomy
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub label: &'static str,
    pub extends: &'static [&'static str],
    pub is_abstract: bool,
    /// Whether entities of this type can be the subject of a match query
    pub matchable: bool,
    properties: &'static [Property],
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Schema {}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

use PropertyType::{Address, Country, Date, Identifier, Name, Text, Topic, Url};

static SCHEMATA: &[Schema] = &[
    Schema {
        name: "Thing",
        label: "Thing",
        extends: &[],
        is_abstract: true,
        matchable: false,
        properties: &[
            prop("name", Name),
            prop("alias", Name),
            prop("previousName", Name),
            prop("weakAlias", Name),
            prop("summary", Text),
            prop("notes", Text),
            prop("keywords", Text),
            prop("country", Country),
            prop("topics", Topic),
            prop("address", Address),
            prop("sourceUrl", Url),
            prop("wikidataId", Identifier),
        ],
    },
    Schema {
        name: "LegalEntity",
        label: "Legal entity",
        extends: &["Thing"],
        is_abstract: false,
        matchable: true,
        properties: &[
            prop("email", Identifier),
            prop("phone", Identifier),
            prop("website", Url),
            prop("jurisdiction", Country),
            prop("mainCountry", Country),
            prop("registrationNumber", Identifier),
            prop("idNumber", Identifier),
            prop("taxNumber", Identifier),
            prop("incorporationDate", Date),
            prop("dissolutionDate", Date),
            prop("legalForm", Text),
            prop("status", Text),
            prop("sector", Text),
        ],
    },
    Schema {
        name: "Person",
        label: "Person",
        extends: &["LegalEntity"],
        is_abstract: false,
        matchable: true,
        properties: &[
            prop("firstName", Name),
            prop("middleName", Name),
            prop("lastName", Name),
            prop("fatherName", Name),
            prop("title", Text),
            prop("birthDate", Date),
            prop("deathDate", Date),
            prop("birthPlace", Text),
            prop("nationality", Country),
            prop("citizenship", Country),
            prop("gender", Text),
            prop("passportNumber", Identifier),
            prop("position", Text),
        ],
    },
    Schema {
        name: "Organization",
        label: "Organization",
        extends: &["LegalEntity"],
        is_abstract: false,
        matchable: true,
        properties: &[prop("classification", Text)],
    },
    Schema {
        name: "Company",
        label: "Company",
        extends: &["Organization"],
        is_abstract: false,
        matchable: true,
        properties: &[
            prop("leiCode", Identifier),
            prop("swiftBic", Identifier),
            prop("capital", Text),
        ],
    },
    Schema {
        name: "PublicBody",
        label: "Public body",
        extends: &["Organization"],
        is_abstract: false,
        matchable: true,
        properties: &[],
    },
    Schema {
        name: "Vessel",
        label: "Vessel",
        extends: &["Thing"],
        is_abstract: false,
        matchable: true,
        properties: &[
            prop("imoNumber", Identifier),
            prop("mmsi", Identifier),
            prop("callSign", Identifier),
            prop("flag", Country),
            prop("type", Text),
            prop("buildDate", Date),
        ],
    },
    Schema {
        name: "Interval",
        label: "Interval",
        extends: &[],
        is_abstract: true,
        matchable: false,
        properties: &[
            prop("startDate", Date),
            prop("endDate", Date),
            prop("summary", Text),
            prop("sourceUrl", Url),
        ],
    },
    Schema {
        name: "Sanction",
        label: "Sanction",
        extends: &["Interval"],
        is_abstract: false,
        matchable: false,
        properties: &[
            edge("entity", "sanctions"),
            prop("authority", Text),
            prop("program", Text),
            prop("reason", Text),
            prop("listingDate", Date),
            prop("country", Country),
        ],
    },
    Schema {
        name: "Identification",
        label: "Identification",
        extends: &["Interval"],
        is_abstract: false,
        matchable: false,
        properties: &[
            edge("holder", "identification"),
            prop("number", Identifier),
            prop("country", Country),
            prop("type", Text),
            prop("authority", Text),
        ],
    },
    Schema {
        name: "Passport",
        label: "Passport",
        extends: &["Identification"],
        is_abstract: false,
        matchable: false,
        properties: &[],
    },
    Schema {
        name: "Ownership",
        label: "Ownership",
        extends: &["Interval"],
        is_abstract: false,
        matchable: false,
        properties: &[
            edge("owner", "ownershipAsset"),
            edge("asset", "ownershipOwner"),
            prop("percentage", Text),
            prop("role", Text),
        ],
    },
    Schema {
        name: "Family",
        label: "Family",
        extends: &["Interval"],
        is_abstract: false,
        matchable: false,
        properties: &[
            edge("person", "familyPerson"),
            edge("relative", "familyRelative"),
            prop("relationship", Text),
        ],
    },
];

impl Schema {
    /// Look up a schema by its exact name
    #[must_use]
    pub fn get(name: &str) -> Option<&'static Schema> {
        SCHEMATA.iter().find(|s| s.name == name)
    }

    /// All schemata in the taxonomy
    #[must_use]
    pub fn all() -> &'static [Schema] {
        SCHEMATA
    }

    /// Direct parents
    pub fn parents(&self) -> impl Iterator<Item = &'static Schema> + '_ {
        self.extends.iter().filter_map(|name| Schema::get(name))
    }

    /// All ancestors, nearest first, excluding `self`
    #[must_use]
    pub fn ancestors(&self) -> Vec<&'static Schema> {
        let mut result: Vec<&'static Schema> = Vec::new();
        let mut queue: Vec<&'static Schema> = self.parents().collect();
        while !queue.is_empty() {
            let current = queue.remove(0);
            if result.contains(&current) {
                continue;
            }
            result.push(current);
            queue.extend(current.parents());
        }
        result
    }

    /// True if `self` is `other` or inherits from it
    #[must_use]
    pub fn is_a(&self, other: &Schema) -> bool {
        self == other || self.ancestors().iter().any(|a| *a == other)
    }

    /// All schemata inheriting from `self`, excluding `self`
    #[must_use]
    pub fn descendants(&self) -> Vec<&'static Schema> {
        SCHEMATA
            .iter()
            .filter(|s| *s != self && s.is_a(self))
            .collect()
    }

    /// Find a property on this schema or any ancestor
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&'static Property> {
        let own = Schema::get(self.name)?
            .properties
            .iter()
            .find(|p| p.name == name);
        own.or_else(|| {
            self.ancestors()
                .into_iter()
                .find_map(|a| a.properties.iter().find(|p| p.name == name))
        })
    }

    /// All properties, own first, then inherited
    #[must_use]
    pub fn properties(&self) -> Vec<&'static Property> {
        let mut props: Vec<&'static Property> = Vec::new();
        let chain = std::iter::once(Schema::get(self.name))
            .flatten()
            .chain(self.ancestors());
        for schema in chain {
            for p in schema.properties {
                if !props.iter().any(|existing| existing.name == p.name) {
                    props.push(p);
                }
            }
        }
        props
    }

    /// Schema names a candidate may carry to be compared against an example of
    /// this type: the type itself, every descendant, and every matchable ancestor.
    #[must_use]
    pub fn matchable_schemata(&self) -> Vec<&'static str> {
        let mut names = vec![self.name];
        names.extend(self.descendants().iter().map(|s| s.name));
        names.extend(
            self.ancestors()
                .iter()
                .filter(|s| s.matchable && !s.is_abstract)
                .map(|s| s.name),
        );
        names
    }

    /// Schema names covered by a search scoped to this type
    #[must_use]
    pub fn search_schemata(&self) -> Vec<&'static str> {
        let mut names = vec![self.name];
        names.extend(self.descendants().iter().map(|s| s.name));
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_schema() {
        let person = Schema::get("Person").unwrap();
        assert_eq!(person.label, "Person");
        assert!(person.matchable);
        assert!(Schema::get("Spaceship").is_none());
        // Names are case-sensitive
        assert!(Schema::get("person").is_none());
    }

    #[test]
    fn test_ancestors() {
        let company = Schema::get("Company").unwrap();
        let names: Vec<&str> = company.ancestors().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Organization", "LegalEntity", "Thing"]);
    }

    #[test]
    fn test_is_a() {
        let person = Schema::get("Person").unwrap();
        let legal = Schema::get("LegalEntity").unwrap();
        let company = Schema::get("Company").unwrap();
        assert!(person.is_a(legal));
        assert!(person.is_a(person));
        assert!(!person.is_a(company));
        assert!(!legal.is_a(person));
    }

    #[test]
    fn test_inherited_property() {
        let person = Schema::get("Person").unwrap();
        assert_eq!(person.property("birthDate").unwrap().ptype, PropertyType::Date);
        assert_eq!(person.property("name").unwrap().ptype, PropertyType::Name);
        assert_eq!(
            person.property("registrationNumber").unwrap().ptype,
            PropertyType::Identifier
        );
        assert!(person.property("imoNumber").is_none());

        let passport = Schema::get("Passport").unwrap();
        assert_eq!(
            passport.property("holder").unwrap().reverse,
            Some("identification")
        );
    }

    #[test]
    fn test_matchable_schemata_never_narrower() {
        let company = Schema::get("Company").unwrap();
        let names = company.matchable_schemata();
        assert!(names.contains(&"Company"));
        assert!(names.contains(&"Organization"));
        assert!(names.contains(&"LegalEntity"));
        assert!(!names.contains(&"Thing"));
        assert!(!names.contains(&"Person"));

        let legal = Schema::get("LegalEntity").unwrap();
        let names = legal.matchable_schemata();
        assert!(names.contains(&"Person"));
        assert!(names.contains(&"Company"));
        assert!(names.contains(&"PublicBody"));
    }

    #[test]
    fn test_search_schemata() {
        let thing = Schema::get("Thing").unwrap();
        let names = thing.search_schemata();
        assert!(names.contains(&"Vessel"));
        assert!(names.contains(&"Person"));
        assert!(!names.contains(&"Sanction"));
    }
}
