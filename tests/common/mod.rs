#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const MASTER_CSV: &str = "\
Req Received Date,Customer Name,Recruiter Assigned,Job Title,No of Open Position,Profiles Submitted,Screen Select from Client,L1 Select,L1 Reject,L2 Select,L2 Reject,Final Select,Onboarded
01-Jan-24,Acme,Asha,Developer,10,5,4,3,1,2,1,1,1
02-Jan-24,Acme,Ben,Tester,3,4,2,1,0,1,0,0,0
Req Received Date,Customer Name,Recruiter Assigned,Job Title,No of Open Position,Profiles Submitted,Screen Select from Client,L1 Select,L1 Reject,L2 Select,L2 Reject,Final Select,Onboarded
03-Jan-24,,Asha,Developer,2,3+,1,1,0,0,0,0,0
05-Jan-24,Beta,Ben,Developer,\"1,000\",n/a,0,0,0,0,0,0,0
";

pub const RECRUITER_CSV: &str = "\
Date,Recruiter,Total,Subcon,Permanent
2024-01-01,Asha,10,8,2
2024-01-02,Asha,10,8,2
2024-01-03,Asha,10,8,2
2024-01-01,Ben,0,0,0
2024-01-02,Ben,20,15,5
2024-01-03,Ben,10,5,5
";

pub const CLIENT_DAYS_CSV: &str = "\
Date,Client,Total,Subcon,Permanent
1,Acme,4,3,1
2,Beta,2,1,1
15,Acme,6,2,4
";

/// Writes `content` to `name` inside a fresh temporary directory.
pub fn write_fixture(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write fixture");
    (dir, path)
}

pub fn write_into(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write fixture");
    path
}
