//! Shared fixture types for the integration suites.
#![allow(dead_code)] // not every suite uses every fixture

use tether::prelude::*;
use tether_mem::MemoryConnection;

#[derive(Debug, Clone, PartialEq)]
pub struct Hero {
    pub name: String,
    pub team: String,
}

impl Record for Hero {
    type Conn = MemoryConnection;
    const TABLE: &'static str = "heroes";
    const PRIMARY_KEY: &'static str = "hero_id";

    fn fresh() -> Self {
        Self {
            name: String::new(),
            team: String::new(),
        }
    }

    fn load(db: &Database<Self::Conn>, id: Id) -> Result<Self> {
        let mut stmt = db.statement("select name, team from heroes where hero_id = :id")?;
        stmt.bind(":id", id)?;
        if !stmt.step()? {
            return Err(Error::BadIdentifier {
                table: Self::TABLE,
                id,
            });
        }
        Ok(Self {
            name: stmt.extract(0)?,
            team: stmt.extract(1)?,
        })
    }

    fn insert(&self, db: &Database<Self::Conn>) -> Result<Id> {
        let mut stmt = db.statement("insert into heroes (name, team) values (:name, :team)")?;
        stmt.bind(":name", self.name.as_str())?;
        stmt.bind(":team", self.team.as_str())?;
        stmt.step_final()?;
        db.connection().last_insert_id()
    }

    fn update(&self, db: &Database<Self::Conn>, id: Id) -> Result<()> {
        let mut stmt =
            db.statement("update heroes set name = :name, team = :team where hero_id = :id")?;
        stmt.bind(":name", self.name.as_str())?;
        stmt.bind(":team", self.team.as_str())?;
        stmt.bind(":id", id)?;
        stmt.step_final()
    }
}

/// Heroes on the "avengers" team, looked up through the base `Hero` map.
pub struct Avenger;

impl Variant for Avenger {
    type Base = Hero;

    fn matches(base: &Hero) -> bool {
        base.team == "avengers"
    }
}

pub fn open_session() -> Session<MemoryConnection> {
    let session = Session::new(MemoryConnection::open());
    session
        .database()
        .execute(
            "create table heroes (hero_id integer primary key autoincrement, \
             name text, team text)",
        )
        .unwrap();
    session
}

pub fn seeded_session() -> Session<MemoryConnection> {
    let session = open_session();
    session
        .database()
        .execute(
            "insert into heroes (name, team) values ('Iron Man', 'avengers'); \
             insert into heroes (name, team) values ('Batman', 'justice league'); \
             insert into heroes (name, team) values ('Thor', 'avengers')",
        )
        .unwrap();
    session
}
