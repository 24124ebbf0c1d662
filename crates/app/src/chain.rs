//! Directory composition: look an id up in one directory, then another.

use nest_domain::error::NestError;
use nest_domain::id::EntityId;

use crate::ports::EntityDirectory;

/// Two directories searched in order.
///
/// The first directory that [`contains`](EntityDirectory::contains) the id
/// handles the write; when neither does, the second one reports the miss.
#[derive(Debug, Clone)]
pub struct ChainedDirectory<A, B> {
    first: A,
    second: B,
}

impl<A, B> ChainedDirectory<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> EntityDirectory for ChainedDirectory<A, B>
where
    A: EntityDirectory + Send + Sync,
    B: EntityDirectory + Send + Sync,
{
    fn contains(&self, id: &EntityId) -> bool {
        self.first.contains(id) || self.second.contains(id)
    }

    async fn apply(&self, id: &EntityId, on: bool) -> Result<(), NestError> {
        if self.first.contains(id) {
            self.first.apply(id, on).await
        } else {
            self.second.apply(id, on).await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use nest_domain::error::NotFoundError;

    use super::*;

    struct SpyDirectory {
        ids: Vec<&'static str>,
        writes: Mutex<Vec<(EntityId, bool)>>,
    }

    impl SpyDirectory {
        fn with(ids: Vec<&'static str>) -> Self {
            Self {
                ids,
                writes: Mutex::new(Vec::new()),
            }
        }

        fn writes(&self) -> Vec<(EntityId, bool)> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl EntityDirectory for SpyDirectory {
        fn contains(&self, id: &EntityId) -> bool {
            self.ids.contains(&id.as_str())
        }

        async fn apply(&self, id: &EntityId, on: bool) -> Result<(), NestError> {
            if !self.contains(id) {
                return Err(NotFoundError {
                    entity: "Entity",
                    id: id.to_string(),
                }
                .into());
            }
            self.writes.lock().unwrap().push((id.clone(), on));
            Ok(())
        }
    }

    #[tokio::test]
    async fn should_write_through_first_directory_that_knows_the_id() {
        let chain = ChainedDirectory::new(
            SpyDirectory::with(vec!["do-1-01"]),
            SpyDirectory::with(vec!["light.kitchen"]),
        );

        chain.apply(&EntityId::from("light.kitchen"), true).await.unwrap();
        chain.apply(&EntityId::from("do-1-01"), false).await.unwrap();

        assert_eq!(chain.first.writes(), vec![(EntityId::from("do-1-01"), false)]);
        assert_eq!(
            chain.second.writes(),
            vec![(EntityId::from("light.kitchen"), true)]
        );
    }

    #[tokio::test]
    async fn should_report_not_found_when_no_directory_knows_the_id() {
        let chain = ChainedDirectory::new(
            SpyDirectory::with(vec!["do-1-01"]),
            SpyDirectory::with(vec![]),
        );
        let id = EntityId::from("ro-9-99");

        assert!(!chain.contains(&id));
        let result = chain.apply(&id, true).await;
        assert!(matches!(result, Err(NestError::NotFound(_))));
    }
}
