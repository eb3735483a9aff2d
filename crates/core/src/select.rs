use crate::backup::BackupCopy;
use crate::words::word_count;

/// A backup chosen as the most complete version of a post.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub backup: &'a BackupCopy,
    pub words: usize,
}

/// Picks the backup with the most words.
///
/// Ties go to the most recent `created_at`; if that ties too, the earlier
/// entry in `backups` wins. Returns `None` only when `backups` is empty: an
/// empty backup is still a candidate with zero words.
pub fn select_best(backups: &[BackupCopy]) -> Option<Candidate<'_>> {
    let mut best: Option<Candidate<'_>> = None;
    for backup in backups {
        let words = word_count(&backup.content);
        let better = match &best {
            None => true,
            Some(current) => {
                words > current.words
                    || (words == current.words && backup.created_at > current.backup.created_at)
            }
        };
        if better {
            best = Some(Candidate { backup, words });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    fn backup(post_id: Uuid, words: usize, created_at: DateTime<Utc>) -> BackupCopy {
        let content = format!("<p>{}</p>", vec!["parola"; words].join(" "));
        BackupCopy {
            id: Uuid::new_v4(),
            post_id,
            content_hash: crate::content_hash(&content),
            content,
            created_at,
        }
    }

    #[test]
    fn no_backups_means_no_candidate() {
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn empty_backup_is_still_a_candidate() {
        let post = Uuid::new_v4();
        let mut only = backup(post, 0, Utc::now());
        only.content = String::new();
        let best = select_best(std::slice::from_ref(&only)).expect("candidate");
        assert_eq!(best.words, 0);
        assert_eq!(best.backup.id, only.id);
    }

    #[test]
    fn picks_the_longest_backup() {
        let post = Uuid::new_v4();
        let t0 = Utc::now();
        let backups = vec![
            backup(post, 40, t0),
            backup(post, 900, t0 - Duration::days(3)),
            backup(post, 120, t0 - Duration::days(9)),
        ];
        let best = select_best(&backups).expect("candidate");
        assert_eq!(best.words, 900);
        for other in &backups {
            assert!(best.words >= word_count(&other.content));
        }
    }

    #[test]
    fn tie_goes_to_the_most_recent_backup() {
        let post = Uuid::new_v4();
        let t1 = Utc::now() - Duration::hours(3);
        let t2 = t1 + Duration::hours(1);
        let t3 = t2 + Duration::hours(1);
        let oldest = backup(post, 1200, t1);
        let middle = backup(post, 2100, t2);
        let newest = backup(post, 2100, t3);

        // Ordering of the input must not matter.
        for order in [
            vec![newest.clone(), middle.clone(), oldest.clone()],
            vec![oldest.clone(), middle.clone(), newest.clone()],
        ] {
            let best = select_best(&order).expect("candidate");
            assert_eq!(best.words, 2100);
            assert_eq!(best.backup.id, newest.id);
        }
    }
}
