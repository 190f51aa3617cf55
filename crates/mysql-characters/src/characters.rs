use std::convert::TryFrom;

use async_trait::async_trait;
use rand::Rng;
use sqlx::{mysql::MySqlRow, MySqlPool, Row};
use tracing::{debug, error, instrument};

use runeward_game::{
    accounts::AccountId,
    characters::{
        CharacterCreate, CharacterCreateError, CharacterData, CharacterFeatures, CharacterId,
        CharacterOpError, CharacterPosition, CharacterService, Class, Gender, Race, Skill, Spell,
    },
    defaults,
};

/// Characters over the realm database.
#[derive(Debug, Clone)]
pub struct MySqlCharacterService {
    pool: MySqlPool,
}

impl MySqlCharacterService {
    pub fn new(pool: MySqlPool) -> Self {
        debug!("starting character service");
        Self { pool }
    }

    async fn guid_in_use(&self, guid: u32) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM characters WHERE guid = ?")
            .bind(guid)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("c")? > 0)
    }

    /// Draw random 24-bit guids until one is free.
    async fn unused_guid(&self) -> Result<u32, sqlx::Error> {
        loop {
            let candidate = rand::thread_rng().gen_range(1..0x00FF_FFFF);
            if !self.guid_in_use(candidate).await? {
                return Ok(candidate);
            }
        }
    }
}

const CHARACTER_COLUMNS: &str = "guid, account, name, race, class, gender, \
     skin, face, hair_style, hair_color, facial_hair, \
     level, health, mana, strength, agility, stamina, intellect, spirit, \
     display_id, faction_template, scale_x, \
     map, zone, position_x, position_y, position_z, orientation";

fn persist_err(e: sqlx::Error) -> CharacterOpError {
    CharacterOpError::PersistError(e.to_string())
}

fn row_to_character(row: &MySqlRow) -> Result<CharacterData, sqlx::Error> {
    let bad_column = |column: &str| sqlx::Error::ColumnNotFound(column.to_string());

    Ok(CharacterData {
        guid: CharacterId(row.try_get("guid")?),
        account: AccountId(row.try_get("account")?),
        name: row.try_get("name")?,
        race: Race::try_from(row.try_get::<u8, _>("race")?).map_err(|_| bad_column("race"))?,
        class: Class::try_from(row.try_get::<u8, _>("class")?).map_err(|_| bad_column("class"))?,
        gender: Gender::try_from(row.try_get::<u8, _>("gender")?)
            .map_err(|_| bad_column("gender"))?,
        features: CharacterFeatures {
            skin: row.try_get("skin")?,
            face: row.try_get("face")?,
            hair_style: row.try_get("hair_style")?,
            hair_color: row.try_get("hair_color")?,
            facial_hair: row.try_get("facial_hair")?,
        },
        stats: runeward_game::characters::CharacterStats {
            level: row.try_get("level")?,
            health: row.try_get("health")?,
            mana: row.try_get("mana")?,
            strength: row.try_get("strength")?,
            agility: row.try_get("agility")?,
            stamina: row.try_get("stamina")?,
            intellect: row.try_get("intellect")?,
            spirit: row.try_get("spirit")?,
            display_id: row.try_get("display_id")?,
            faction_template: row.try_get("faction_template")?,
            scale_x: row.try_get("scale_x")?,
        },
        position: CharacterPosition {
            map: row.try_get("map")?,
            zone: row.try_get("zone")?,
            x: row.try_get("position_x")?,
            y: row.try_get("position_y")?,
            z: row.try_get("position_z")?,
            orientation: row.try_get("orientation")?,
        },
    })
}

#[async_trait]
impl CharacterService for MySqlCharacterService {
    async fn character_by_guid(
        &self,
        guid: CharacterId,
    ) -> Result<Option<CharacterData>, CharacterOpError> {
        let row = sqlx::query(&format!(
            "SELECT {CHARACTER_COLUMNS} FROM characters WHERE guid = ?"
        ))
        .bind(guid.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(persist_err)?;

        row.as_ref()
            .map(row_to_character)
            .transpose()
            .map_err(persist_err)
    }

    async fn character_exists_by_name(&self, name: &str) -> Result<bool, CharacterOpError> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM characters WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(persist_err)?;
        Ok(row.try_get::<i64, _>("c").map_err(persist_err)? > 0)
    }

    async fn characters_by_account(
        &self,
        account: AccountId,
    ) -> Result<Vec<CharacterData>, CharacterOpError> {
        let rows = sqlx::query(&format!(
            "SELECT {CHARACTER_COLUMNS} FROM characters WHERE account = ? ORDER BY guid"
        ))
        .bind(account.0)
        .fetch_all(&self.pool)
        .await
        .map_err(persist_err)?;

        rows.iter()
            .map(row_to_character)
            .collect::<Result<_, _>>()
            .map_err(persist_err)
    }

    #[instrument(skip(self, create), fields(name = %create.name))]
    async fn create_character(
        &self,
        account: AccountId,
        create: CharacterCreate,
    ) -> Result<CharacterData, CharacterCreateError> {
        if !defaults::is_supported_combination(create.race, create.class) {
            return Err(CharacterCreateError::UnsupportedCombination);
        }

        if self
            .character_exists_by_name(&create.name)
            .await
            .map_err(|_| CharacterCreateError::Failed)?
        {
            return Err(CharacterCreateError::NameInUse);
        }

        let stats = defaults::new_character_stats(create.race, create.class, create.gender);
        let position = defaults::race_defaults(create.race).start;
        let guid = self
            .unused_guid()
            .await
            .map_err(|_| CharacterCreateError::Failed)?;

        let result: Result<(), sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;

            sqlx::query(&format!(
                "INSERT INTO characters ({CHARACTER_COLUMNS}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ))
            .bind(guid)
            .bind(account.0)
            .bind(&create.name)
            .bind(u8::from(create.race))
            .bind(u8::from(create.class))
            .bind(u8::from(create.gender))
            .bind(create.features.skin)
            .bind(create.features.face)
            .bind(create.features.hair_style)
            .bind(create.features.hair_color)
            .bind(create.features.facial_hair)
            .bind(stats.level)
            .bind(stats.health)
            .bind(stats.mana)
            .bind(stats.strength)
            .bind(stats.agility)
            .bind(stats.stamina)
            .bind(stats.intellect)
            .bind(stats.spirit)
            .bind(stats.display_id)
            .bind(stats.faction_template)
            .bind(stats.scale_x)
            .bind(position.map)
            .bind(position.zone)
            .bind(position.x)
            .bind(position.y)
            .bind(position.z)
            .bind(position.orientation)
            .execute(&mut tx)
            .await?;

            let class = defaults::class_defaults(create.class);
            for &(skill_id, level, stat_level) in class.skills {
                sqlx::query(
                    "INSERT INTO character_skills (guid, skill, level, stat_level) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(guid)
                .bind(skill_id)
                .bind(level)
                .bind(stat_level)
                .execute(&mut tx)
                .await?;
            }

            for &spell_id in class.spells {
                sqlx::query("INSERT INTO character_spells (guid, spell) VALUES (?, ?)")
                    .bind(guid)
                    .bind(spell_id)
                    .execute(&mut tx)
                    .await?;
            }

            tx.commit().await
        }
        .await;

        if let Err(e) = result {
            error!("an error occurred while creating character: {e}");
            return Err(CharacterCreateError::Failed);
        }

        debug!("character {} created", create.name);
        Ok(CharacterData {
            guid: CharacterId(guid),
            account,
            name: create.name,
            race: create.race,
            class: create.class,
            gender: create.gender,
            features: create.features,
            stats,
            position,
        })
    }

    #[instrument(skip(self))]
    async fn delete_character(&self, guid: CharacterId) -> Result<bool, CharacterOpError> {
        let mut tx = self.pool.begin().await.map_err(persist_err)?;

        sqlx::query("DELETE FROM character_skills WHERE guid = ?")
            .bind(guid.0)
            .execute(&mut tx)
            .await
            .map_err(persist_err)?;
        sqlx::query("DELETE FROM character_spells WHERE guid = ?")
            .bind(guid.0)
            .execute(&mut tx)
            .await
            .map_err(persist_err)?;
        let deleted = sqlx::query("DELETE FROM characters WHERE guid = ?")
            .bind(guid.0)
            .execute(&mut tx)
            .await
            .map_err(persist_err)?
            .rows_affected();

        tx.commit().await.map_err(persist_err)?;
        debug!("character {} deleted", guid);
        Ok(deleted > 0)
    }

    async fn skills_for(&self, guid: CharacterId) -> Result<Vec<Skill>, CharacterOpError> {
        let rows = sqlx::query(
            "SELECT skill, level, stat_level FROM character_skills \
             WHERE guid = ? ORDER BY skill",
        )
        .bind(guid.0)
        .fetch_all(&self.pool)
        .await
        .map_err(persist_err)?;

        rows.iter()
            .map(|row| {
                let id: u16 = row.try_get("skill")?;
                let (max_level, max_stat_level) = defaults::skill_max_levels(id);
                Ok(Skill {
                    id,
                    level: row.try_get("level")?,
                    stat_level: row.try_get("stat_level")?,
                    max_level,
                    max_stat_level,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(persist_err)
    }

    async fn spells_for(&self, guid: CharacterId) -> Result<Vec<Spell>, CharacterOpError> {
        let rows = sqlx::query(
            "SELECT spell FROM character_spells WHERE guid = ? ORDER BY spell",
        )
        .bind(guid.0)
        .fetch_all(&self.pool)
        .await
        .map_err(persist_err)?;

        rows.iter()
            .map(|row| Ok(Spell { id: row.try_get("spell")? }))
            .collect::<Result<_, sqlx::Error>>()
            .map_err(persist_err)
    }
}
