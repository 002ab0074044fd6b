use std::collections::BTreeMap;

pub type Bag = BTreeMap<String, String>;

/// Identifies a single relation: the local endpoint name and the id assigned
/// when the relation was established.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub endpoint: String,
    pub id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub key: Key,

    /// The related application.
    pub app: String,

    /// Data published by the related application.
    pub remote: Bag,

    /// Data published by this application.
    pub local: Bag,
}

/// Read access to the relations currently established.
pub trait RelationStore {
    /// All relations on an endpoint, ordered by id.
    fn relations(&self, endpoint: &str) -> Vec<&Relation>;

    fn is_related(&self, endpoint: &str) -> bool {
        !self.relations(endpoint).is_empty()
    }

    /// The relation on an endpoint that accepts at most one related
    /// application.
    fn relation(&self, endpoint: &str) -> Result<Option<&Relation>, TooManyRelations> {
        let mut relations = self.relations(endpoint);
        match relations.len() {
            0 | 1 => Ok(relations.pop()),
            count => Err(TooManyRelations {
                endpoint: endpoint.to_string(),
                count,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{count} applications are related on {endpoint}, at most one is allowed")]
pub struct TooManyRelations {
    pub endpoint: String,
    pub count: usize,
}

/// An in-memory set of relations.
///
/// Relations are identified by their key and the related application, so two
/// applications claiming the same key are kept apart.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relations(BTreeMap<(Key, String), Relation>);

// === impl Key ===

impl Key {
    pub fn new(endpoint: impl Into<String>, id: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            id,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.endpoint, self.id)
    }
}

// === impl Relation ===

impl Relation {
    pub fn new(key: Key, app: impl Into<String>) -> Self {
        Self {
            key,
            app: app.into(),
            remote: Bag::new(),
            local: Bag::new(),
        }
    }
}

// === impl Relations ===

impl Relations {
    pub fn insert(&mut self, relation: Relation) -> Option<Relation> {
        self.0
            .insert((relation.key.clone(), relation.app.clone()), relation)
    }

    pub fn remove(&mut self, key: &Key, app: &str) -> Option<Relation> {
        self.0.remove(&(key.clone(), app.to_string()))
    }

    pub fn get(&self, key: &Key, app: &str) -> Option<&Relation> {
        self.0.get(&(key.clone(), app.to_string()))
    }

    pub fn get_mut(&mut self, key: &Key, app: &str) -> Option<&mut Relation> {
        self.0.get_mut(&(key.clone(), app.to_string()))
    }

    /// Every relation established under `key`, one per related application.
    pub fn by_key_mut<'a>(
        &'a mut self,
        key: &'a Key,
    ) -> impl Iterator<Item = &'a mut Relation> {
        self.0
            .iter_mut()
            .filter(move |((k, _), _)| k == key)
            .map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds a relation on which the remote application has published `data`.
    pub fn with_remote(
        mut self,
        endpoint: &str,
        id: u32,
        app: &str,
        data: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut relation = Relation::new(Key::new(endpoint, id), app);
        relation.remote.extend(data);
        self.insert(relation);
        self
    }
}

impl RelationStore for Relations {
    fn relations(&self, endpoint: &str) -> Vec<&Relation> {
        self.0
            .values()
            .filter(|r| r.key.endpoint == endpoint)
            .collect()
    }
}

impl FromIterator<Relation> for Relations {
    fn from_iter<T: IntoIterator<Item = Relation>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|r| ((r.key.clone(), r.app.clone()), r))
                .collect(),
        )
    }
}
