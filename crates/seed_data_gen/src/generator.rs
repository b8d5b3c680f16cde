//! Data generator that produces row data for the reference and fact tables.
//!
//! Generation order is strict: users, tags and assets first, then events and
//! incidents (which reference assets), then the two join tables. Each step
//! returns its rows together with the identifier pool later steps need.

use crate::categories::{
    WeightedPicker, ASSET_STATUS, ASSET_TYPES, ATTACK_VECTORS, DETECTION_METHODS, ENVIRONMENTS,
    EVENT_OCCURRENCE_STATUS, EVENT_SEVERITY, EVENT_TYPES, IMPACT_LEVELS,
    INCIDENT_OCCURRENCE_STATUS, INCIDENT_PRIORITY, INCIDENT_SEVERITY, INCIDENT_STATUS,
    INCIDENT_TYPES, OPERATING_SYSTEMS, PROTOCOLS, RESOLVED_INCIDENT_STATUSES, TAG_VOCABULARY,
    USER_ASSET_ROLE,
};
use crate::fake::FakeData;
use crate::ids::IdPool;
use crate::rows::{
    AssetRow, AssetTagRow, EventRow, IncidentRow, TableData, TagRow, UserAssetRow, UserRow,
};
use crate::schema::TableId;
use crate::GenerateError;
use chrono::{DateTime, TimeDelta, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Days of history for backdated reference timestamps
const HISTORY_DAYS: i64 = 365;

/// Bounds on how long a resolved incident stayed open
const MIN_RESOLUTION_HOURS: i64 = 1;
const MAX_RESOLUTION_HOURS: i64 = 168;

/// Assets assigned to each user
pub const ASSETS_PER_USER: (usize, usize) = (5, 15);

/// Tags applied to each asset
pub const TAGS_PER_ASSET: (usize, usize) = (2, 5);

/// Number of incidents the first title is offset by (`INC-1000`)
const INCIDENT_NUMBER_BASE: usize = 1000;

/// Row counts for every generated table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counts {
    pub users: usize,
    pub assets: usize,
    pub tags: usize,
    pub events: usize,
    pub incidents: usize,
    pub event_occurrences: usize,
    pub incident_occurrences: usize,
}

impl Default for Counts {
    fn default() -> Self {
        Self {
            users: 10,
            assets: 150,
            tags: 150,
            events: 450,
            incidents: 150,
            event_occurrences: 100_000,
            incident_occurrences: 100_000,
        }
    }
}

/// Weighted samplers, built once per generator
#[derive(Debug, Clone)]
struct Pickers {
    asset_status: WeightedPicker,
    event_severity: WeightedPicker,
    incident_severity: WeightedPicker,
    incident_priority: WeightedPicker,
    incident_status: WeightedPicker,
    user_asset_role: WeightedPicker,
    event_occurrence_status: WeightedPicker,
    incident_occurrence_status: WeightedPicker,
}

impl Pickers {
    fn new() -> Result<Self, GenerateError> {
        Ok(Self {
            asset_status: ASSET_STATUS.picker()?,
            event_severity: EVENT_SEVERITY.picker()?,
            incident_severity: INCIDENT_SEVERITY.picker()?,
            incident_priority: INCIDENT_PRIORITY.picker()?,
            incident_status: INCIDENT_STATUS.picker()?,
            user_asset_role: USER_ASSET_ROLE.picker()?,
            event_occurrence_status: EVENT_OCCURRENCE_STATUS.picker()?,
            incident_occurrence_status: INCIDENT_OCCURRENCE_STATUS.picker()?,
        })
    }
}

/// Main data generator
pub struct Generator<R: Rng> {
    pub(crate) fake: FakeData<R>,
    pickers: Pickers,
    now: DateTime<Utc>,
}

impl Generator<ChaCha8Rng> {
    /// Generator over ChaCha8, seeded when `seed` is given and from OS entropy otherwise
    pub fn from_seed(seed: Option<u64>, now: DateTime<Utc>) -> Result<Self, GenerateError> {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };
        Self::new(rng, now)
    }
}

impl<R: Rng> Generator<R> {
    /// `now` is the reference instant every backdated timestamp is measured from
    pub fn new(rng: R, now: DateTime<Utc>) -> Result<Self, GenerateError> {
        Ok(Self {
            fake: FakeData::new(rng),
            pickers: Pickers::new()?,
            now,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn users(&mut self, count: usize) -> (Vec<UserRow>, IdPool) {
        let now = self.now;
        let rows: Vec<UserRow> = (0..count)
            .map(|_| UserRow {
                id: self.fake.uuid(),
                username: self.fake.username(),
                email: self.fake.email(),
                created_at: now,
                updated_at: now,
            })
            .collect();
        let pool = IdPool::new(TableId::Users.name(), rows.iter().map(|r| r.id).collect());
        (rows, pool)
    }

    /// Tags: the fixed vocabulary first, synthesized names after it runs out
    pub fn tags(&mut self, count: usize) -> (Vec<TagRow>, IdPool) {
        let now = self.now;
        let mut rows = Vec::with_capacity(count);

        for i in 0..count {
            let name = match TAG_VOCABULARY.get(i) {
                Some(name) => name.to_string(),
                None => format!(
                    "{}-{}-{}",
                    self.fake.word(),
                    self.fake.word(),
                    self.fake.int_range(1, 999)
                ),
            };

            rows.push(TagRow {
                id: self.fake.uuid(),
                name,
                description: self.fake.sentence(),
                created_at: now,
                updated_at: now,
            });
        }

        let pool = IdPool::new(TableId::Tags.name(), rows.iter().map(|r| r.id).collect());
        (rows, pool)
    }

    pub fn assets(&mut self, count: usize) -> (Vec<AssetRow>, IdPool) {
        let now = self.now;
        let mut rows = Vec::with_capacity(count);

        for _ in 0..count {
            let id = self.fake.uuid();
            let metadata = json!({
                "ip_address": self.fake.ipv4(),
                "hostname": self.fake.hostname(),
                "os": self.fake.pick(OPERATING_SYSTEMS),
                "version": format!(
                    "{}.{}.{}",
                    self.fake.int_range(1, 10),
                    self.fake.int_range(0, 20),
                    self.fake.int_range(0, 50)
                ),
                "environment": self.fake.pick(ENVIRONMENTS),
                "criticality": self.fake.pick(IMPACT_LEVELS),
                "owner_team": self.fake.company(),
            });
            let name = format!(
                "{}-{}-{}",
                self.fake.word(),
                self.fake.word(),
                self.fake.int_range(100, 999)
            );

            rows.push(AssetRow {
                id,
                name,
                asset_type: *self.fake.pick(ASSET_TYPES),
                status: self.fake.weighted(&self.pickers.asset_status),
                metadata,
                created_at: now,
                updated_at: now,
            });
        }

        let pool = IdPool::new(TableId::Assets.name(), rows.iter().map(|r| r.id).collect());
        (rows, pool)
    }

    pub fn events(
        &mut self,
        count: usize,
        assets: &IdPool,
    ) -> Result<(Vec<EventRow>, IdPool), GenerateError> {
        if count > 0 {
            assets.require_non_empty()?;
        }

        let now = self.now;
        let mut rows = Vec::with_capacity(count);

        for _ in 0..count {
            let id = self.fake.uuid();
            let asset_id = assets.pick(self.fake.rng())?;
            let event_type = *self.fake.pick(EVENT_TYPES);
            let severity = self.fake.weighted(&self.pickers.event_severity);

            let metadata = json!({
                "source": self.fake.ipv4(),
                "destination": self.fake.ipv4(),
                "port": self.fake.int_range(1, 65535),
                "protocol": self.fake.pick(PROTOCOLS),
                "detection_method": self.fake.pick(DETECTION_METHODS),
                "confidence": self.fake.int_range(60, 100),
            });

            rows.push(EventRow {
                id,
                asset_id,
                event_type,
                severity,
                description: format!("Detected {} on asset", event_type.replace('_', " ")),
                metadata,
                created_at: now,
                updated_at: now,
            });
        }

        let pool = IdPool::new(TableId::Events.name(), rows.iter().map(|r| r.id).collect());
        Ok((rows, pool))
    }

    pub fn incidents(
        &mut self,
        count: usize,
        assets: &IdPool,
    ) -> Result<(Vec<IncidentRow>, IdPool), GenerateError> {
        if count > 0 {
            assets.require_non_empty()?;
        }

        let mut rows = Vec::with_capacity(count);

        for i in 0..count {
            let id = self.fake.uuid();
            let asset_id = assets.pick(self.fake.rng())?;
            let incident_type = *self.fake.pick(INCIDENT_TYPES);
            let severity = self.fake.weighted(&self.pickers.incident_severity);
            let priority = self.fake.weighted(&self.pickers.incident_priority);
            let status = self.fake.weighted(&self.pickers.incident_status);

            let metadata = json!({
                "affected_users": self.fake.int_range(1, 1000),
                "estimated_impact": self.fake.pick(IMPACT_LEVELS),
                "attack_vector": self.fake.pick(ATTACK_VECTORS),
                "ioc_count": self.fake.int_range(0, 50),
                "assigned_to": self.fake.name(),
            });

            let created_at = self.fake.days_ago(self.now, HISTORY_DAYS);
            let resolved_at = if RESOLVED_INCIDENT_STATUSES.contains(&status) {
                let hours = self
                    .fake
                    .int_range(MIN_RESOLUTION_HOURS, MAX_RESOLUTION_HOURS);
                Some(created_at + TimeDelta::hours(hours))
            } else {
                None
            };

            rows.push(IncidentRow {
                id,
                asset_id,
                incident_type,
                severity,
                priority,
                title: format!(
                    "INC-{}: {}",
                    i + INCIDENT_NUMBER_BASE,
                    title_case(incident_type)
                ),
                description: self.fake.text(200),
                status,
                metadata,
                created_at,
                updated_at: created_at,
                resolved_at,
            });
        }

        let pool = IdPool::new(
            TableId::Incidents.name(),
            rows.iter().map(|r| r.id).collect(),
        );
        Ok((rows, pool))
    }

    /// Link every user to a distinct sample of assets
    pub fn user_assets(&mut self, users: &IdPool, assets: &IdPool) -> Vec<UserAssetRow> {
        let (lower, upper) = ASSETS_PER_USER;
        let mut rows = Vec::new();

        for &user_id in users.as_slice() {
            for asset_id in self.fake.sample_distinct(assets.as_slice(), lower, upper) {
                rows.push(UserAssetRow {
                    user_id,
                    asset_id,
                    role: self.fake.weighted(&self.pickers.user_asset_role),
                    assigned_at: self.fake.days_ago(self.now, HISTORY_DAYS),
                });
            }
        }

        rows
    }

    /// Link every asset to a distinct sample of tags
    pub fn asset_tags(&mut self, assets: &IdPool, tags: &IdPool) -> Vec<AssetTagRow> {
        let (lower, upper) = TAGS_PER_ASSET;
        let mut rows = Vec::new();

        for &asset_id in assets.as_slice() {
            for tag_id in self.fake.sample_distinct(tags.as_slice(), lower, upper) {
                rows.push(AssetTagRow {
                    asset_id,
                    tag_id,
                    tagged_at: self.fake.days_ago(self.now, HISTORY_DAYS),
                });
            }
        }

        rows
    }

    /// Generate every reference and fact table in dependency order
    pub fn reference_data(&mut self, counts: &Counts) -> Result<ReferenceData, GenerateError> {
        let (users, user_pool) = self.users(counts.users);
        let (tags, tag_pool) = self.tags(counts.tags);
        let (assets, asset_pool) = self.assets(counts.assets);
        let (events, event_pool) = self.events(counts.events, &asset_pool)?;
        let (incidents, incident_pool) = self.incidents(counts.incidents, &asset_pool)?;
        let user_assets = self.user_assets(&user_pool, &asset_pool);
        let asset_tags = self.asset_tags(&asset_pool, &tag_pool);

        Ok(ReferenceData {
            users,
            tags,
            assets,
            events,
            incidents,
            user_assets,
            asset_tags,
            parents: OccurrenceParents {
                events: event_pool,
                incidents: incident_pool,
            },
        })
    }

    pub(crate) fn event_occurrence_status(&mut self) -> &'static str {
        self.fake.weighted(&self.pickers.event_occurrence_status)
    }

    pub(crate) fn incident_occurrence_status(&mut self) -> &'static str {
        self.fake.weighted(&self.pickers.incident_occurrence_status)
    }
}

/// Parent pools the occurrence streams draw from
#[derive(Debug, Clone)]
pub struct OccurrenceParents {
    pub events: IdPool,
    pub incidents: IdPool,
}

/// All rows of the reference phase
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub users: Vec<UserRow>,
    pub tags: Vec<TagRow>,
    pub assets: Vec<AssetRow>,
    pub events: Vec<EventRow>,
    pub incidents: Vec<IncidentRow>,
    pub user_assets: Vec<UserAssetRow>,
    pub asset_tags: Vec<AssetTagRow>,
    pub parents: OccurrenceParents,
}

impl ReferenceData {
    /// Split into insertable tables (in insert order) and the occurrence parent pools
    pub fn into_parts(self) -> (Vec<TableData>, OccurrenceParents) {
        let tables = vec![
            TableData::from_rows(TableId::Users, self.users),
            TableData::from_rows(TableId::Tags, self.tags),
            TableData::from_rows(TableId::Assets, self.assets),
            TableData::from_rows(TableId::Events, self.events),
            TableData::from_rows(TableId::Incidents, self.incidents),
            TableData::from_rows(TableId::UserAssets, self.user_assets),
            TableData::from_rows(TableId::AssetTags, self.asset_tags),
        ];
        (tables, self.parents)
    }
}

/// `security_breach` -> `Security Breach`
fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
