use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};

use super::volumes::{MountTable, MountedVolume};

/// Mount table change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeEvent {
    Mounted(PathBuf),
    Unmounted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// Compare two mount table snapshots.
///
/// A volume that disappears while a new path shows up for the same device is
/// reported as a rename. Renames come first, then unmounts, then mounts.
pub fn diff_snapshots(previous: &[MountedVolume], current: &[MountedVolume]) -> Vec<VolumeEvent> {
    let removed: Vec<&MountedVolume> = previous
        .iter()
        .filter(|p| !current.iter().any(|c| c.path == p.path))
        .collect();
    let mut added: Vec<Option<&MountedVolume>> = current
        .iter()
        .filter(|c| !previous.iter().any(|p| p.path == c.path))
        .map(Some)
        .collect();

    let mut renames = Vec::new();
    let mut unmounts = Vec::new();

    for gone in removed {
        let partner = gone.device.as_ref().and_then(|device| {
            added
                .iter_mut()
                .find(|a| matches!(a, Some(v) if v.device.as_ref() == Some(device)))
                .and_then(Option::take)
        });

        match partner {
            Some(new) => renames.push(VolumeEvent::Renamed {
                from: gone.path.clone(),
                to: new.path.clone(),
            }),
            None => unmounts.push(VolumeEvent::Unmounted(gone.path.clone())),
        }
    }

    let mounts = added
        .into_iter()
        .flatten()
        .map(|v| VolumeEvent::Mounted(v.path.clone()));

    renames.into_iter().chain(unmounts).chain(mounts).collect()
}

/// Watches the mount table and reports mount, unmount and rename events.
///
/// The first snapshot is the baseline and produces no events.
pub struct VolumeWatcher<M> {
    table: Arc<M>,
    interval: Duration,
}

impl<M> VolumeWatcher<M>
where
    M: MountTable + Send + Sync + 'static,
{
    pub fn new(table: Arc<M>, interval: Duration) -> Self {
        Self { table, interval }
    }

    /// Stream of events; the background poller stops once the stream is dropped.
    pub fn events(self) -> ReceiverStream<VolumeEvent> {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(self.run(tx));
        ReceiverStream::new(rx)
    }

    /// Invoke `on_change` once per event until the returned handle is dropped.
    pub fn subscribe<F>(self, mut on_change: F) -> WatchHandle
    where
        F: FnMut(VolumeEvent) + Send + 'static,
    {
        let mut events = self.events();
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                on_change(event);
            }
        });
        WatchHandle { task }
    }

    async fn snapshot(&self) -> Option<Vec<MountedVolume>> {
        let table = Arc::clone(&self.table);
        match tokio::task::spawn_blocking(move || table.mounted_volumes()).await {
            Ok(Ok(volumes)) => Some(volumes),
            Ok(Err(e)) => {
                warn!("Skipping mount table poll: {:#}", e);
                None
            }
            Err(e) => {
                error!("Mount table poll task failed: {}", e);
                None
            }
        }
    }

    async fn run(self, tx: mpsc::Sender<VolumeEvent>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut previous: Option<Vec<MountedVolume>> = None;
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }

            let Some(current) = self.snapshot().await else {
                continue;
            };

            if let Some(previous) = &previous {
                for event in diff_snapshots(previous, &current) {
                    debug!("Volume event: {:?}", event);
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            previous = Some(current);
        }
        debug!("Volume watcher stopped");
    }
}

/// Keeps a subscription alive; dropping it stops the watcher
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::testing::FakeMountTable;
    use crate::disk::volumes::VolumeLister;
    use std::sync::Mutex;

    fn on_device(path: &str, device: &str) -> MountedVolume {
        let mut volume = MountedVolume::new(path);
        volume.device = Some(device.to_string());
        volume
    }

    #[test]
    fn test_no_change_no_events() {
        let snapshot = vec![MountedVolume::new("/"), MountedVolume::new("/Volumes/BOOT")];
        assert!(diff_snapshots(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn test_mount_and_unmount() {
        let before = vec![MountedVolume::new("/"), MountedVolume::new("/Volumes/A")];
        let after = vec![MountedVolume::new("/"), MountedVolume::new("/Volumes/B")];

        assert_eq!(
            diff_snapshots(&before, &after),
            vec![
                VolumeEvent::Unmounted(PathBuf::from("/Volumes/A")),
                VolumeEvent::Mounted(PathBuf::from("/Volumes/B")),
            ]
        );
    }

    #[test]
    fn test_same_device_new_path_is_rename() {
        let before = vec![on_device("/Volumes/Untitled", "/dev/disk3")];
        let after = vec![
            on_device("/Volumes/BOOT", "/dev/disk3"),
            on_device("/Volumes/DATA", "/dev/disk4"),
        ];

        assert_eq!(
            diff_snapshots(&before, &after),
            vec![
                VolumeEvent::Renamed {
                    from: PathBuf::from("/Volumes/Untitled"),
                    to: PathBuf::from("/Volumes/BOOT"),
                },
                VolumeEvent::Mounted(PathBuf::from("/Volumes/DATA")),
            ]
        );
    }

    #[test]
    fn test_each_change_is_one_event() {
        let before = vec![
            on_device("/Volumes/A", "/dev/disk2"),
            on_device("/Volumes/B", "/dev/disk3"),
        ];
        let after = vec![on_device("/Volumes/C", "/dev/disk4")];

        let events = diff_snapshots(&before, &after);
        assert_eq!(events.len(), 3);
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscribe_relists_once_per_event() {
        let table = Arc::new(FakeMountTable::with_paths(&["/", "/Volumes/A"]));
        let lister = Arc::new(VolumeLister::new(Arc::clone(&table), "Volumes"));

        let relists = Arc::new(Mutex::new(Vec::new()));
        let handle = {
            let relists = Arc::clone(&relists);
            let lister = Arc::clone(&lister);
            VolumeWatcher::new(Arc::clone(&table), Duration::from_millis(10)).subscribe(
                move |event| {
                    relists.lock().unwrap().push((event, lister.list_volumes()));
                },
            )
        };

        // Let the baseline snapshot happen before changing the table
        let baseline = Arc::clone(&table);
        wait_for(move || baseline.calls() >= 2).await;

        table.set(vec![
            MountedVolume::new("/"),
            MountedVolume::new("/Volumes/B"),
            MountedVolume::new("/Volumes/C"),
        ]);

        let observed = Arc::clone(&relists);
        wait_for(move || observed.lock().unwrap().len() >= 3).await;
        // Give a few more polls a chance to produce spurious events
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(handle);

        let relists = relists.lock().unwrap();
        assert_eq!(relists.len(), 3);
        assert_eq!(relists[0].0, VolumeEvent::Unmounted(PathBuf::from("/Volumes/A")));
        assert_eq!(relists[1].0, VolumeEvent::Mounted(PathBuf::from("/Volumes/B")));
        assert_eq!(relists[2].0, VolumeEvent::Mounted(PathBuf::from("/Volumes/C")));

        // After settling, the relisted contents match a fresh listing
        assert_eq!(relists[2].1, lister.list_volumes());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_polls_are_skipped() {
        let table = Arc::new(FakeMountTable::failing());
        let mut events =
            VolumeWatcher::new(Arc::clone(&table), Duration::from_millis(10)).events();

        let polled = Arc::clone(&table);
        wait_for(move || polled.calls() >= 3).await;

        // First successful snapshot only sets the baseline
        table.set(vec![MountedVolume::new("/Volumes/A")]);
        let polled = Arc::clone(&table);
        let seen = polled.calls();
        wait_for(move || polled.calls() >= seen + 2).await;

        table.set(vec![
            MountedVolume::new("/Volumes/A"),
            MountedVolume::new("/Volumes/B"),
        ]);
        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, VolumeEvent::Mounted(PathBuf::from("/Volumes/B")));
    }
}
