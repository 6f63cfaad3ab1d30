mod scan_sessions;
mod snapshots;
