//! Init command - scaffold a new project

use console::style;
use helmix_core::project::PROJECT_FILE;
use std::fs;
use std::path::Path;

use crate::error::{CliError, Result};

const PROJECT_YAML: &str = r#"apiVersion: helmix/v1
name: __NAME__
version: 0.1.0
description: Kubernetes deployment for __NAME__

environments:
  staging:
    namespace: __NAME__-staging
  production:
    namespace: __NAME__

engine:
  strict: true

gpg:
  # Every values file must carry a valid signature
  requireSignatures: false
  # Fingerprints allowed to sign values files (empty = any key in your keyring)
  trustedKeys: []

output:
  dir: rendered
"#;

const VALUES_YAML: &str = r#"# Values shared by every environment

replicaCount: 1

image:
  repository: nginx
  tag: "1.27"
  pullPolicy: IfNotPresent

service:
  type: ClusterIP
  port: 80

resources: {}
"#;

const STAGING_VALUES: &str = r#"# Overrides for staging (merged over values.yaml)
image:
  tag: "1.27-alpine"
"#;

const PRODUCTION_VALUES: &str = r#"# Overrides for production (merged over values.yaml)
#
# Secrets go in values/production.secrets.yaml.gpg:
#   gpg --encrypt --sign -r <key> -o values/production.secrets.yaml.gpg secrets.yaml
replicaCount: 3

resources:
  limits:
    cpu: 500m
    memory: 256Mi
"#;

const SCHEMA_YAML: &str = r#"$schema: "https://json-schema.org/draft/2020-12/schema"
type: object
required: [image, service]
properties:
  replicaCount:
    type: integer
    minimum: 0
    default: 1
  image:
    type: object
    required: [repository, tag]
    properties:
      repository: { type: string }
      tag: { type: string }
      pullPolicy:
        type: string
        enum: [Always, IfNotPresent, Never]
        default: IfNotPresent
  service:
    type: object
    properties:
      type: { type: string, default: ClusterIP }
      port: { type: integer, default: 80 }
"#;

const HELPERS_TPL: &str = r#"{%- macro labels(name) -%}
app.kubernetes.io/name: {{ name }}
app.kubernetes.io/managed-by: helmix
{%- endmacro %}
"#;

const DEPLOYMENT_YAML: &str = r#"{%- from "_helpers.tpl" import labels -%}
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ project.name }}
  namespace: {{ env.namespace }}
  labels:
    {{- labels(project.name) | nindent(4) }}
spec:
  replicas: {{ values.replicaCount }}
  selector:
    matchLabels:
      app.kubernetes.io/name: {{ project.name }}
  template:
    metadata:
      labels:
        {{- labels(project.name) | nindent(8) }}
    spec:
      containers:
        - name: {{ project.name }}
          image: "{{ values.image.repository }}:{{ values.image.tag }}"
          imagePullPolicy: {{ values.image.pullPolicy }}
          ports:
            - name: http
              containerPort: 80
              protocol: TCP
          {%- if values.resources %}
          resources:
            {{- values.resources | toyaml | nindent(12) }}
          {%- endif %}
"#;

const SERVICE_YAML: &str = r#"{%- from "_helpers.tpl" import labels -%}
apiVersion: v1
kind: Service
metadata:
  name: {{ project.name }}
  namespace: {{ env.namespace }}
  labels:
    {{- labels(project.name) | nindent(4) }}
spec:
  type: {{ values.service.type }}
  ports:
    - port: {{ values.service.port }}
      targetPort: http
      protocol: TCP
      name: http
  selector:
    app.kubernetes.io/name: {{ project.name }}
"#;

const NOTES_TXT: &str = r#"{{ project.name }} rendered for {{ env.name }} (namespace {{ env.namespace }}).

Apply with:
  kubectl apply -n {{ env.namespace }} -f rendered/
"#;

const GITIGNORE: &str = r#"# helmix
rendered/
# Decrypted secrets must never be committed
*.secrets.yaml
"#;

pub fn run(name: &str, output: &Path) -> Result<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CliError::other(format!(
            "Invalid project name '{}': use lowercase letters, digits and '-'",
            name
        )));
    }

    let project_dir = output.join(name);
    if project_dir.exists() {
        return Err(CliError::other(format!(
            "Directory {} already exists",
            project_dir.display()
        )));
    }

    let files: [(&str, &str); 10] = [
        (PROJECT_FILE, PROJECT_YAML),
        ("values.yaml", VALUES_YAML),
        ("values/staging.yaml", STAGING_VALUES),
        ("values/production.yaml", PRODUCTION_VALUES),
        ("values.schema.yaml", SCHEMA_YAML),
        ("templates/_helpers.tpl", HELPERS_TPL),
        ("templates/deployment.yaml", DEPLOYMENT_YAML),
        ("templates/service.yaml", SERVICE_YAML),
        ("templates/NOTES.txt", NOTES_TXT),
        (".gitignore", GITIGNORE),
    ];

    for (rel, content) in files {
        let path = project_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content.replace("__NAME__", name))?;
    }

    println!(
        "{} Created project {} at {}",
        style("✓").green().bold(),
        style(name).cyan(),
        style(project_dir.display()).dim()
    );

    println!();
    println!("Next steps:");
    println!(
        "  1. Edit {} and {}",
        style("values.yaml").cyan(),
        style("values/<env>.yaml").cyan()
    );
    println!("  2. Edit templates in {}", style("templates/").cyan());
    println!(
        "  3. Preview with: {} render {} -e staging",
        style("helmix").green(),
        project_dir.display()
    );

    Ok(())
}
